use std::cmp::Ordering;
use std::collections::HashMap;

use crate::store::Candidate;

/// Ranking strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    /// Persisted fixability score only.
    Fixability,
    /// Weighted blend of lexical relevance and fixability.
    Relevance,
}

impl SortBy {
    /// `"fixability"` selects [`SortBy::Fixability`]; anything else blends.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("fixability") {
            SortBy::Fixability
        } else {
            SortBy::Relevance
        }
    }
}

/// Weights of the blended ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeights {
    pub text: f64,
    pub fixability: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            text: 0.65,
            fixability: 0.35,
        }
    }
}

/// Map a non-negative BM25 score into [0, 1), larger = more relevant.
pub fn normalize_relevance(bm25: f32) -> f64 {
    let s = (bm25 as f64).abs();
    s / (1.0 + s)
}

pub fn blended_score(bm25: f32, fixability_score: f64, weights: BlendWeights) -> f64 {
    weights.text * normalize_relevance(bm25) + weights.fixability * (fixability_score / 100.0)
}

/// Order candidates by the selected strategy. The sort is stable, so ties keep storage order.
pub fn rank(
    candidates: &mut [Candidate],
    relevance: &HashMap<i64, f32>,
    sort: SortBy,
    weights: BlendWeights,
) {
    match sort {
        SortBy::Fixability => candidates.sort_by(|a, b| {
            b.fixability_score
                .partial_cmp(&a.fixability_score)
                .unwrap_or(Ordering::Equal)
        }),
        SortBy::Relevance => {
            let blended = |c: &Candidate| {
                let bm25 = relevance.get(&c.issue_id).copied().unwrap_or(0.0);
                blended_score(bm25, c.fixability_score, weights)
            };
            candidates.sort_by(|a, b| blended(b).partial_cmp(&blended(a)).unwrap_or(Ordering::Equal));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(issue_id: i64, fixability_score: f64) -> Candidate {
        Candidate {
            issue_id,
            fixability_score,
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<i64> {
        candidates.iter().map(|c| c.issue_id).collect()
    }

    #[test]
    fn test_sort_by_parse() {
        assert_eq!(SortBy::parse("fixability"), SortBy::Fixability);
        assert_eq!(SortBy::parse("Fixability"), SortBy::Fixability);
        assert_eq!(SortBy::parse("relevance"), SortBy::Relevance);
        assert_eq!(SortBy::parse(""), SortBy::Relevance);
    }

    #[test]
    fn test_normalize_relevance_is_monotonic() {
        assert_eq!(normalize_relevance(0.0), 0.0);
        assert_eq!(normalize_relevance(1.0), 0.5);
        assert!(normalize_relevance(8.0) > normalize_relevance(2.0));
        assert!(normalize_relevance(1_000.0) < 1.0);
    }

    #[test]
    fn test_blended_score_weights() {
        let w = BlendWeights::default();
        assert!((blended_score(1.0, 100.0, w) - (0.65 * 0.5 + 0.35)).abs() < 1e-9);
        assert_eq!(blended_score(0.0, 0.0, w), 0.0);
    }

    #[test]
    fn test_rank_by_fixability_is_stable() {
        let mut c = vec![cand(1, 40.0), cand(2, 90.0), cand(3, 40.0), cand(4, 70.0)];
        rank(&mut c, &HashMap::new(), SortBy::Fixability, BlendWeights::default());
        assert_eq!(ids(&c), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_rank_blended_prefers_relevance_when_scores_tie() {
        let mut c = vec![cand(1, 50.0), cand(2, 50.0)];
        let relevance = HashMap::from([(1, 0.5_f32), (2, 6.0_f32)]);
        rank(&mut c, &relevance, SortBy::Relevance, BlendWeights::default());
        assert_eq!(ids(&c), vec![2, 1]);
    }

    #[test]
    fn test_rank_blended_can_lift_fixable_issue() {
        // Slightly weaker text match, far more fixable
        let mut c = vec![cand(1, 10.0), cand(2, 95.0)];
        let relevance = HashMap::from([(1, 3.0_f32), (2, 2.5_f32)]);
        rank(&mut c, &relevance, SortBy::Relevance, BlendWeights::default());
        assert_eq!(ids(&c), vec![2, 1]);

        // Fixability ignores relevance entirely
        rank(&mut c, &relevance, SortBy::Fixability, BlendWeights::default());
        assert_eq!(ids(&c), vec![2, 1]);
    }
}
