//! Branch admission policy.

use quarry_core::branch::BranchFilter;
use quarry_core::build::Build;

/// Message returned to callers when branch rules reject a trigger.
pub const SKIPPED_BY_BRANCH: &str = "Branch does not match restrictions defined in yaml";

/// Whether `build` may proceed under `filter`.
///
/// Tag and deployment events always proceed; branch rules only gate pushes
/// and pull requests.
pub fn admits(filter: &BranchFilter, build: &Build) -> bool {
    build.event.bypasses_branch_rules() || filter.matches(&build.branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::build::BuildEvent;

    fn main_only() -> BranchFilter {
        BranchFilter::new(vec!["main".to_string()], vec![])
    }

    #[test]
    fn test_push_respects_rules() {
        assert!(admits(&main_only(), &Build::new(BuildEvent::Push, "main", "a1")));
        assert!(!admits(&main_only(), &Build::new(BuildEvent::Push, "feature/x", "a1")));
        assert!(!admits(
            &main_only(),
            &Build::new(BuildEvent::PullRequest, "feature/x", "a1")
        ));
    }

    #[test]
    fn test_tag_and_deploy_bypass_rules() {
        assert!(admits(&main_only(), &Build::new(BuildEvent::Tag, "v1.0.0", "a1")));
        assert!(admits(
            &main_only(),
            &Build::new(BuildEvent::Deployment, "feature/x", "a1")
        ));
    }
}
