//! Build configuration parsing for Quarry CI.
//!
//! Implements [`ConfigParser`] over the YAML configuration file committed to
//! each repository.

mod branch;
pub mod matrix;
mod meta;

pub use branch::parse_branches;
pub use matrix::MatrixExpander;

use quarry_core::branch::BranchFilter;
use quarry_core::build::{Axis, BuildEvent};
use quarry_core::headers::Headers;
use quarry_core::ports::ConfigParser;
use quarry_core::{Error, Result};
use serde_yaml::Value;
use tracing::debug;

/// YAML implementation of [`ConfigParser`].
#[derive(Default)]
pub struct YamlConfigParser {
    matrix: MatrixExpander,
}

impl YamlConfigParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn document(raw: &[u8]) -> Result<Value> {
        serde_yaml::from_slice(raw).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Parse for lookups that fall back to defaults on malformed input.
    fn lenient(raw: &[u8]) -> Value {
        Self::document(raw).unwrap_or_else(|e| {
            debug!(error = %e, "configuration is not valid yaml, using defaults");
            Value::Null
        })
    }
}

impl ConfigParser for YamlConfigParser {
    fn expand_matrix(&self, raw: &[u8]) -> Result<Vec<Axis>> {
        self.matrix.expand(&Self::document(raw)?)
    }

    fn parse_branch_rules(&self, raw: &[u8]) -> BranchFilter {
        parse_branches(&Self::lenient(raw))
    }

    fn resolve_platform(&self, raw: &[u8], default: &str) -> String {
        meta::platform(&Self::lenient(raw)).unwrap_or_else(|| default.to_string())
    }

    fn resolve_labels(&self, raw: &[u8]) -> Headers {
        meta::labels(&Self::lenient(raw))
    }

    fn resolve_queue(&self, raw: &[u8], event: BuildEvent) -> Option<String> {
        meta::queue(&Self::lenient(raw), event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
platform: linux/arm64
labels:
  foo: bar
branches: [main]
matrix:
  RUST: [stable, nightly]
pipeline:
  test:
    image: rust:${RUST}
    commands:
      - cargo test
"#;

    #[test]
    fn test_full_document() {
        let parser = YamlConfigParser::new();
        let raw = CONFIG.as_bytes();

        assert_eq!(parser.expand_matrix(raw).unwrap().len(), 2);
        assert!(parser.parse_branch_rules(raw).matches("main"));
        assert!(!parser.parse_branch_rules(raw).matches("dev"));
        assert_eq!(parser.resolve_platform(raw, "linux/amd64"), "linux/arm64");
        assert_eq!(parser.resolve_labels(raw).get("foo"), Some("bar"));
        assert_eq!(parser.resolve_queue(raw, BuildEvent::Deployment), None);
    }

    #[test]
    fn test_malformed_yaml() {
        let parser = YamlConfigParser::new();
        let raw = b"matrix: [unclosed";

        assert!(matches!(parser.expand_matrix(raw), Err(Error::ConfigParse(_))));
        assert!(parser.parse_branch_rules(raw).is_unrestricted());
        assert_eq!(parser.resolve_platform(raw, "linux/amd64"), "linux/amd64");
        assert!(parser.resolve_labels(raw).is_empty());
        assert_eq!(parser.resolve_queue(raw, BuildEvent::Deployment), None);
    }

    #[test]
    fn test_empty_document() {
        let parser = YamlConfigParser::new();
        assert!(parser.expand_matrix(b"").unwrap().is_empty());
        assert_eq!(parser.resolve_platform(b"", "linux/amd64"), "linux/amd64");
    }
}
