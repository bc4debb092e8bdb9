//! Matrix expansion for parallel job generation.

use quarry_core::build::Axis;
use quarry_core::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Expander for `matrix:` sections.
///
/// ```yaml
/// matrix:
///   GO_VERSION: [1.21, 1.22]
///   DATABASE: [postgres, mysql]
///   exclude:
///     - GO_VERSION: 1.21
///       DATABASE: mysql
///   include:
///     - GO_VERSION: tip
///       DATABASE: postgres
/// ```
///
/// Dimensions combine as a cartesian product in declared order, with the
/// first dimension varying slowest. Excludes drop every combination that
/// contains all of their entries; includes are appended afterwards unless
/// already present.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand the `matrix` key of a parsed configuration document.
    pub fn expand(&self, document: &Value) -> Result<Vec<Axis>> {
        let matrix = match document.get("matrix") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Mapping(m)) => m,
            Some(_) => return Err(Error::ConfigParse("matrix must be a mapping".to_string())),
        };

        let mut dimensions: Vec<(String, Vec<String>)> = Vec::new();
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for (key, value) in matrix {
            let key = scalar_to_string(key)
                .ok_or_else(|| Error::ConfigParse("matrix keys must be scalars".to_string()))?;
            match key.as_str() {
                "include" => include = self.parse_axis_list(&key, value)?,
                "exclude" => exclude = self.parse_axis_list(&key, value)?,
                _ => {
                    let values = self.parse_values(&key, value)?;
                    if !values.is_empty() {
                        dimensions.push((key, values));
                    }
                }
            }
        }

        let mut combinations = self.generate_combinations(&dimensions);

        combinations.retain(|combo| !exclude.iter().any(|ex| combo.contains_all(ex)));

        for axis in include {
            if !combinations.contains(&axis) {
                combinations.push(axis);
            }
        }

        Ok(combinations)
    }

    fn generate_combinations(&self, dimensions: &[(String, Vec<String>)]) -> Vec<Axis> {
        if dimensions.is_empty() {
            return Vec::new();
        }

        let mut result = vec![Axis::new()];

        for (key, values) in dimensions {
            let mut next = Vec::with_capacity(result.len() * values.len());
            for combo in &result {
                for value in values {
                    let mut axis = combo.clone();
                    axis.insert(key.clone(), value.clone());
                    next.push(axis);
                }
            }
            result = next;
        }

        result
    }

    fn parse_values(&self, key: &str, value: &Value) -> Result<Vec<String>> {
        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    scalar_to_string(item).ok_or_else(|| {
                        Error::ConfigParse(format!("matrix values for {} must be scalars", key))
                    })
                })
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => scalar_to_string(other).map(|v| vec![v]).ok_or_else(|| {
                Error::ConfigParse(format!("matrix dimension {} must be a list", key))
            }),
        }
    }

    fn parse_axis_list(&self, key: &str, value: &Value) -> Result<Vec<Axis>> {
        let items = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Sequence(items) => items,
            _ => return Err(Error::ConfigParse(format!("matrix {} must be a list", key))),
        };

        items
            .iter()
            .map(|item| match item {
                Value::Mapping(m) => self.mapping_to_axis(key, m),
                _ => Err(Error::ConfigParse(format!(
                    "matrix {} entries must be mappings",
                    key
                ))),
            })
            .collect()
    }

    fn mapping_to_axis(&self, key: &str, mapping: &Mapping) -> Result<Axis> {
        let mut axis = Axis::new();
        for (k, v) in mapping {
            match (scalar_to_string(k), scalar_to_string(v)) {
                (Some(k), Some(v)) => axis.insert(k, v),
                _ => {
                    return Err(Error::ConfigParse(format!(
                        "matrix {} entries must map scalars to scalars",
                        key
                    )));
                }
            }
        }
        Ok(axis)
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a YAML scalar the way it would appear in an environment variable.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn expand(yaml: &str) -> Result<Vec<Axis>> {
        let doc: Value = serde_yaml::from_str(yaml).unwrap();
        MatrixExpander::new().expand(&doc)
    }

    fn axis(pairs: &[(&str, &str)]) -> Axis {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_no_matrix() {
        assert!(expand("image: rust\n").unwrap().is_empty());
        assert!(expand("matrix:\n").unwrap().is_empty());
    }

    #[test]
    fn test_matrix_expansion_order() {
        let axes = expand(
            "matrix:\n  OS: [linux, macos]\n  VERSION: ['18', '20', '22']\n",
        )
        .unwrap();

        assert_eq!(axes.len(), 6);
        assert_eq!(axes[0], axis(&[("OS", "linux"), ("VERSION", "18")]));
        assert_eq!(axes[1], axis(&[("OS", "linux"), ("VERSION", "20")]));
        assert_eq!(axes[3], axis(&[("OS", "macos"), ("VERSION", "18")]));
        assert_eq!(axes[5], axis(&[("OS", "macos"), ("VERSION", "22")]));
    }

    #[test]
    fn test_scalar_values_are_stringified() {
        let axes = expand("matrix:\n  GO: [1.21, 2]\n  CGO: [true]\n").unwrap();
        assert_eq!(axes[0], axis(&[("GO", "1.21"), ("CGO", "true")]));
        assert_eq!(axes[1], axis(&[("GO", "2"), ("CGO", "true")]));
    }

    #[test]
    fn test_matrix_with_exclude() {
        let axes = expand(
            r#"
matrix:
  os: [linux, macos]
  arch: [amd64, arm64]
  exclude:
    - os: macos
      arch: amd64
"#,
        )
        .unwrap();

        // 2x2 = 4, minus 1 excluded = 3
        assert_eq!(axes.len(), 3);
        assert!(!axes.contains(&axis(&[("os", "macos"), ("arch", "amd64")])));
    }

    #[test]
    fn test_include_only_matrix() {
        let axes = expand(
            r#"
matrix:
  include:
    - GO_VERSION: 1.4
      REDIS_VERSION: 2.8
    - GO_VERSION: 1.5
      REDIS_VERSION: 3.0
"#,
        )
        .unwrap();

        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0], axis(&[("GO_VERSION", "1.4"), ("REDIS_VERSION", "2.8")]));
        assert_eq!(axes[1].get("GO_VERSION"), Some("1.5"));
    }

    #[test]
    fn test_include_not_duplicated() {
        let axes = expand(
            "matrix:\n  os: [linux]\n  include:\n    - os: linux\n    - os: windows\n",
        )
        .unwrap();
        assert_eq!(axes, vec![axis(&[("os", "linux")]), axis(&[("os", "windows")])]);
    }

    #[test]
    fn test_empty_dimension_ignored() {
        let axes = expand("matrix:\n  os: []\n  arch: [arm64]\n").unwrap();
        assert_eq!(axes, vec![axis(&[("arch", "arm64")])]);
    }

    #[test]
    fn test_invalid_matrix_is_error() {
        assert!(matches!(expand("matrix: [1, 2]\n"), Err(Error::ConfigParse(_))));
        assert!(matches!(
            expand("matrix:\n  os:\n    - {nested: true}\n"),
            Err(Error::ConfigParse(_))
        ));
        assert!(matches!(
            expand("matrix:\n  include: linux\n"),
            Err(Error::ConfigParse(_))
        ));
    }
}
