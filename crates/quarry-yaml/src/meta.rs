//! Routing metadata declared in the configuration: platform, labels and
//! queue overrides.

use crate::matrix::scalar_to_string;
use quarry_core::build::BuildEvent;
use quarry_core::headers::Headers;
use serde_yaml::Value;

/// `platform: linux/arm64`
pub fn platform(document: &Value) -> Option<String> {
    document
        .get("platform")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// ```yaml
/// labels:
///   region: eu-west-1
///   gpu: true
/// ```
pub fn labels(document: &Value) -> Headers {
    let Some(Value::Mapping(m)) = document.get("labels") else {
        return Headers::new();
    };

    m.iter()
        .filter_map(|(k, v)| Some((scalar_to_string(k)?, scalar_to_string(v)?)))
        .collect()
}

/// ```yaml
/// deploy:
///   queue: builds.deploy.production
/// ```
///
/// Only deployment events may be routed away from the general queue.
pub fn queue(document: &Value, event: BuildEvent) -> Option<String> {
    match event {
        BuildEvent::Deployment => document
            .get("deploy")
            .and_then(|d| d.get("queue"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        BuildEvent::Push | BuildEvent::PullRequest | BuildEvent::Tag => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_platform() {
        assert_eq!(platform(&doc("platform: linux/arm64\n")).as_deref(), Some("linux/arm64"));
        assert_eq!(platform(&doc("platform: '  '\n")), None);
        assert_eq!(platform(&doc("image: rust\n")), None);
    }

    #[test]
    fn test_labels_in_declared_order() {
        let headers = labels(&doc("labels:\n  zone: b\n  foo: bar\n  gpu: true\n"));
        let pairs: Vec<(&str, &str)> = headers.iter().collect();
        assert_eq!(pairs, vec![("zone", "b"), ("foo", "bar"), ("gpu", "true")]);
    }

    #[test]
    fn test_labels_malformed() {
        assert!(labels(&doc("labels: [a, b]\n")).is_empty());
    }

    #[test]
    fn test_deploy_queue_only_for_deployments() {
        let d = doc("deploy:\n  queue: builds.deploy.prod\n");
        assert_eq!(queue(&d, BuildEvent::Deployment).as_deref(), Some("builds.deploy.prod"));
        assert_eq!(queue(&d, BuildEvent::Push), None);
        assert_eq!(queue(&doc("deploy: true\n"), BuildEvent::Deployment), None);
    }
}
