//! Display-only decomposition of a persisted score into three 0-1 buckets.
//!
//! The buckets are a lossy re-projection of the same feature set for the UI.
//! Ranking only ever reads the canonical score from [`crate::scoring::engine`].

use crate::models::{FeatureSet, FixabilityBreakdown, FixabilityResult, Grade, IssueState};

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Approximate the three display buckets from the feature set.
pub fn breakdown_from_features(features: &FeatureSet) -> FixabilityBreakdown {
    let mut repo_health: f64 = 0.0;
    if features.state == IssueState::Open {
        repo_health += 0.3;
    }
    if features.maintainer_replied {
        repo_health += 0.4;
    }
    if features.comments_count >= 3 {
        repo_health += 0.3;
    } else if features.comments_count >= 1 {
        repo_health += 0.15;
    }

    let mut issue_signals: f64 = 0.0;
    if features.has_label("good first issue") {
        issue_signals += 0.3;
    }
    if features.has_label("help wanted") {
        issue_signals += 0.25;
    }
    if features.has_label("bug") {
        issue_signals += 0.15;
    }
    if features.maintainer_replied {
        issue_signals += 0.3;
    }

    let mut code_context: f64 = 0.0;
    if features.has_steps_to_reproduce {
        code_context += 0.3;
    }
    if features.has_expected_vs_actual {
        code_context += 0.2;
    }
    if features.has_stack_trace {
        code_context += 0.2;
    }
    if features.has_code_block {
        code_context += 0.15;
    }
    if features.env_detail_count >= 2 {
        code_context += 0.15;
    } else if features.env_detail_count >= 1 {
        code_context += 0.08;
    }

    FixabilityBreakdown {
        repo_health: round4(repo_health.min(1.0)),
        issue_signals: round4(issue_signals.min(1.0)),
        code_context: round4(code_context.min(1.0)),
    }
}

/// Build the display result for a stored score. The stored grade is kept as-is.
pub fn compute_fixability_from_db(score: f64, grade: Grade, features: &FeatureSet) -> FixabilityResult {
    FixabilityResult {
        score: round4(score / 100.0),
        grade,
        breakdown: breakdown_from_features(features),
        enriched: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_empty_features() {
        let b = breakdown_from_features(&FeatureSet::default());
        // Default state is open
        assert_eq!(b.repo_health, 0.3);
        assert_eq!(b.issue_signals, 0.0);
        assert_eq!(b.code_context, 0.0);
    }

    #[test]
    fn test_breakdown_caps_at_one() {
        let f = FeatureSet {
            has_steps_to_reproduce: true,
            has_expected_vs_actual: true,
            has_stack_trace: true,
            has_code_block: true,
            env_detail_count: 4,
            maintainer_replied: true,
            labels: vec!["good first issue".into(), "help wanted".into(), "bug".into()],
            comments_count: 9,
            ..FeatureSet::default()
        };
        let b = breakdown_from_features(&f);
        assert_eq!(b.repo_health, 1.0);
        assert_eq!(b.issue_signals, 1.0);
        assert_eq!(b.code_context, 1.0);
    }

    #[test]
    fn test_breakdown_partial_signals() {
        let f = FeatureSet {
            has_code_block: true,
            env_detail_count: 1,
            labels: vec!["bug".into()],
            state: IssueState::Closed,
            comments_count: 1,
            ..FeatureSet::default()
        };
        let b = breakdown_from_features(&f);
        assert_eq!(b.repo_health, 0.15);
        assert_eq!(b.issue_signals, 0.15);
        assert_eq!(b.code_context, 0.23);
    }

    #[test]
    fn test_compute_from_db_normalises_score_and_keeps_grade() {
        let r = compute_fixability_from_db(76.0, Grade::B, &FeatureSet::default());
        assert_eq!(r.score, 0.76);
        assert_eq!(r.grade, Grade::B);
        assert!(r.enriched);
    }

    #[test]
    fn test_unscored_defaults() {
        let r = compute_fixability_from_db(0.0, Grade::F, &FeatureSet::default());
        assert_eq!(r.score, 0.0);
        assert_eq!(r.grade, Grade::F);
    }
}
