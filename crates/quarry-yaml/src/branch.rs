//! Branch rule parsing.

use quarry_core::branch::BranchFilter;
use serde_yaml::Value;
use tracing::debug;

/// Read the `branches` key.
///
/// Accepts a single pattern, a list of include patterns, or a mapping with
/// `include` and/or `exclude`. Anything else leaves branches unrestricted.
pub fn parse_branches(document: &Value) -> BranchFilter {
    match document.get("branches") {
        None | Some(Value::Null) => BranchFilter::unrestricted(),
        Some(Value::Mapping(m)) => {
            let include = m.get("include").map(patterns).unwrap_or_default();
            let exclude = m.get("exclude").map(patterns).unwrap_or_default();
            BranchFilter::new(include, exclude)
        }
        Some(other) => BranchFilter::new(patterns(other), Vec::new()),
    }
}

fn patterns(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    debug!(?other, "ignoring non-string branch pattern");
                    None
                }
            })
            .collect(),
        other => {
            debug!(?other, "ignoring malformed branch rule");
            Vec::new()
        }
    }
}
