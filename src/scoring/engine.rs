use crate::models::{FeatureSet, Grade, IssueState};

/// Every score starts here before adjustments.
pub const BASE_SCORE: f64 = 50.0;

pub const BLOCKED_LABELS: &[&str] = &["blocked", "waiting", "waiting-for-author", "needs-more-info"];
pub const NEGATIVE_LABELS: &[&str] = &["wontfix", "won't fix", "invalid", "duplicate"];

/// Output of the score engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: f64,
    pub grade: Grade,
    pub reasons: Vec<String>,
}

/// One signed adjustment: applied when `applies` holds, recorded as `reason`.
pub struct Adjustment {
    pub delta: f64,
    pub reason: &'static str,
    pub applies: fn(&FeatureSet) -> bool,
}

/// Ordered adjustment table. Reason order in the output follows this order.
pub static ADJUSTMENTS: &[Adjustment] = &[
    // Text signals
    Adjustment {
        delta: 8.0,
        reason: "+8 steps to reproduce",
        applies: |f| f.has_steps_to_reproduce,
    },
    Adjustment {
        delta: 5.0,
        reason: "+5 expected vs actual",
        applies: |f| f.has_expected_vs_actual,
    },
    Adjustment {
        delta: 4.0,
        reason: "+4 stack trace",
        applies: |f| f.has_stack_trace,
    },
    Adjustment {
        delta: 3.0,
        reason: "+3 code block",
        applies: |f| f.has_code_block,
    },
    Adjustment {
        delta: 4.0,
        reason: "+4 env details (2+)",
        applies: |f| f.env_detail_count >= 2,
    },
    Adjustment {
        delta: 2.0,
        reason: "+2 env detail (1)",
        applies: |f| f.env_detail_count == 1,
    },
    // Maintainer engagement
    Adjustment {
        delta: 10.0,
        reason: "+10 maintainer replied",
        applies: |f| f.maintainer_replied,
    },
    // Labels
    Adjustment {
        delta: 8.0,
        reason: "+8 good first issue label",
        applies: |f| f.has_label("good first issue"),
    },
    Adjustment {
        delta: 6.0,
        reason: "+6 help wanted label",
        applies: |f| f.has_label("help wanted"),
    },
    Adjustment {
        delta: 3.0,
        reason: "+3 bug label",
        applies: |f| f.has_label("bug"),
    },
    // Comment activity only counts while the issue is open
    Adjustment {
        delta: 5.0,
        reason: "+5 active discussion (3+ comments)",
        applies: |f| f.state == IssueState::Open && f.comments_count >= 3,
    },
    Adjustment {
        delta: 2.0,
        reason: "+2 some discussion",
        applies: |f| f.state == IssueState::Open && (1..3).contains(&f.comments_count),
    },
    // Negative signals
    Adjustment {
        delta: -15.0,
        reason: "-15 blocked/waiting label",
        applies: |f| f.has_any_label(BLOCKED_LABELS),
    },
    Adjustment {
        delta: -20.0,
        reason: "-20 wontfix/invalid/duplicate label",
        applies: |f| f.has_any_label(NEGATIVE_LABELS),
    },
    Adjustment {
        delta: -10.0,
        reason: "-10 closed",
        applies: |f| f.state == IssueState::Closed,
    },
    // Staleness tiers are exclusive
    Adjustment {
        delta: -8.0,
        reason: "-8 stale (180+ days)",
        applies: |f| f.days_old >= 180.0,
    },
    Adjustment {
        delta: -4.0,
        reason: "-4 aging (90+ days)",
        applies: |f| f.days_old >= 90.0 && f.days_old < 180.0,
    },
];

/// Compute the additive fixability score, clamped to [0, 100].
pub fn score(features: &FeatureSet) -> ScoreOutcome {
    let mut score = BASE_SCORE;
    let mut reasons = Vec::new();

    for adj in ADJUSTMENTS.iter().filter(|a| (a.applies)(features)) {
        score += adj.delta;
        reasons.push(adj.reason.to_string());
    }

    let score = score.clamp(0.0, 100.0);

    ScoreOutcome {
        score,
        grade: Grade::from_score(score),
        reasons,
    }
}
