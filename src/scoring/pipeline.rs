use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{FeatureSet, IssueFeatures, IssueRecord};
use crate::scoring::engine;
use crate::scoring::features::extract_features;
use crate::store::{parse_timestamp, Store};

/// Fractional days between `created_at` and `now`. Missing or malformed input is 0.
pub fn days_since(created_at: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(created) = created_at.and_then(parse_timestamp) else {
        return 0.0;
    };
    let secs = (now - created).num_seconds() as f64;
    (secs / 86_400.0).max(0.0)
}

/// Assemble the full feature set for one issue.
pub fn build_feature_set(record: &IssueRecord, maintainer_replied: bool, now: DateTime<Utc>) -> FeatureSet {
    let issue = &record.issue;
    let text = extract_features(Some(issue.body.as_str()));

    FeatureSet {
        has_steps_to_reproduce: text.has_steps_to_reproduce,
        has_expected_vs_actual: text.has_expected_vs_actual,
        has_stack_trace: text.has_stack_trace,
        has_code_block: text.has_code_block,
        env_detail_count: text.env_detail_count,
        maintainer_replied,
        labels: issue.labels.clone(),
        state: issue.state,
        comments_count: issue.comments_count.max(0) as u32,
        days_old: days_since(issue.created_at.as_deref(), now),
    }
}

/// Score one dirty issue and persist the result as a single row.
///
/// `computed_at` never precedes the issue's own `updated_at`, so an issue
/// dated ahead of the local clock is still clean once scored.
fn score_issue(store: &Store, record: &IssueRecord, now: DateTime<Utc>) -> Result<()> {
    let issue_id = record.issue.issue_id;
    let maintainer_replied = store
        .get_comments_for_issue(issue_id)?
        .iter()
        .any(|c| c.author_association.is_maintainer());

    let features = build_feature_set(record, maintainer_replied, now);
    let outcome = engine::score(&features);
    let computed_at = record
        .issue
        .updated_at
        .as_deref()
        .and_then(parse_timestamp)
        .map_or(now, |updated| updated.max(now));

    store.upsert_issue_features(&IssueFeatures {
        issue_id,
        fixability_score: outcome.score,
        grade: outcome.grade,
        reasons: outcome.reasons,
        features,
        computed_at,
    })
}

fn score_records(store: &Store, dirty: &[IssueRecord], now: DateTime<Utc>) -> usize {
    let mut scored = 0;
    for record in dirty {
        match score_issue(store, record, now) {
            Ok(()) => scored += 1,
            Err(e) => tracing::warn!(
                "Failed to score issue {} ({}#{}): {e:#}",
                record.issue.issue_id,
                record.repo_full_name,
                record.issue.number
            ),
        }
    }

    if !dirty.is_empty() {
        tracing::info!("Scored {scored}/{} dirty issues", dirty.len());
    }
    scored
}

/// Score up to `limit` dirty issues. Returns how many were persisted.
pub fn score_all_dirty(store: &Store, limit: usize) -> Result<usize> {
    score_all_dirty_at(store, limit, Utc::now())
}

/// [`score_all_dirty`] with an explicit clock.
///
/// A failure on one issue is logged and skipped; issues already written stay committed.
pub fn score_all_dirty_at(store: &Store, limit: usize, now: DateTime<Utc>) -> Result<usize> {
    let dirty = store.get_dirty_issues(limit)?;
    Ok(score_records(store, &dirty, now))
}

/// Re-run batches until one comes back short of `limit`. Returns the total scored.
///
/// Stops early when a batch selects only issues this drain already handled.
pub fn drain_dirty(store: &Store, limit: usize) -> Result<usize> {
    let limit = limit.max(1);
    let mut seen = HashSet::new();
    let mut total = 0;
    loop {
        let dirty = store.get_dirty_issues(limit)?;
        if dirty.is_empty() {
            break;
        }
        let fresh = dirty
            .iter()
            .filter(|r| seen.insert(r.issue.issue_id))
            .count();
        if fresh == 0 {
            tracing::warn!("{} issues stayed dirty after scoring; stopping drain", dirty.len());
            break;
        }

        let scored = score_records(store, &dirty, Utc::now());
        total += scored;
        if dirty.len() < limit || scored < limit {
            break;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthorAssociation, Comment, Grade, Issue, IssueState, Repository};
    use chrono::{Duration, TimeZone};

    const REPRO_BODY: &str = "## Steps to reproduce\n\n```python\nresult = parse(None)\n```\n\nExpected behavior: should return empty.";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: 1,
                full_name: "owner/repo".into(),
                owner: "owner".into(),
                name: "repo".into(),
                ..Repository::default()
            })
            .unwrap();
        store
    }

    fn ts(dt: DateTime<Utc>) -> Option<String> {
        Some(crate::store::format_timestamp(dt))
    }

    #[test]
    fn test_days_since() {
        let n = now();
        assert_eq!(days_since(ts(n - Duration::days(16)).as_deref(), n), 16.0);
        assert_eq!(days_since(Some("2026-02-28T00:00:00"), n), 1.5);
        assert_eq!(days_since(Some("garbage"), n), 0.0);
        assert_eq!(days_since(None, n), 0.0);
        // Future timestamps do not produce negative ages
        assert_eq!(days_since(ts(n + Duration::days(3)).as_deref(), n), 0.0);
    }

    #[test]
    fn test_end_to_end_score() {
        let store = seeded_store();
        let created = now() - Duration::days(16);
        store
            .upsert_issue(&Issue {
                issue_id: 10,
                repo_id: 1,
                number: 7,
                title: "parse(None) crashes".into(),
                body: REPRO_BODY.into(),
                state: IssueState::Open,
                labels: vec!["bug".into(), "good first issue".into()],
                comments_count: 5,
                created_at: ts(created),
                updated_at: ts(created + Duration::days(1)),
                ..Issue::default()
            })
            .unwrap();
        store
            .upsert_comment(&Comment {
                comment_id: 100,
                issue_id: 10,
                body: "Confirmed, thanks".into(),
                user_login: "maintainer".into(),
                author_association: AuthorAssociation::Member,
                created_at: ts(created + Duration::hours(5)),
                updated_at: None,
            })
            .unwrap();

        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 1);

        let stored = store.get_issue_features(10).unwrap().unwrap();
        assert_eq!(stored.fixability_score, 92.0);
        assert_eq!(stored.grade, Grade::A);
        assert!(stored.features.maintainer_replied);
        assert_eq!(stored.features.days_old, 16.0);
        assert_eq!(stored.reasons.first().map(String::as_str), Some("+8 steps to reproduce"));
        assert_eq!(stored.reasons.len(), 7);
    }

    #[test]
    fn test_rescoring_clean_set_is_noop() {
        let store = seeded_store();
        for id in 1..=3 {
            store
                .upsert_issue(&Issue {
                    issue_id: id,
                    repo_id: 1,
                    number: id,
                    updated_at: Some("2026-02-01T00:00:00Z".into()),
                    ..Issue::default()
                })
                .unwrap();
        }

        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 3);
        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 0);
        assert!(store.get_dirty_issues(500).unwrap().is_empty());
    }

    #[test]
    fn test_batch_limit_and_drain() {
        let store = seeded_store();
        for id in 1..=7 {
            store
                .upsert_issue(&Issue {
                    issue_id: id,
                    repo_id: 1,
                    number: id,
                    updated_at: Some("2020-01-01T00:00:00Z".into()),
                    ..Issue::default()
                })
                .unwrap();
        }

        assert_eq!(score_all_dirty(&store, 3).unwrap(), 3);
        assert_eq!(drain_dirty(&store, 3).unwrap(), 4);
        assert!(store.get_dirty_issues(500).unwrap().is_empty());
    }

    fn plain_issue(id: i64, updated_at: &str) -> Issue {
        Issue {
            issue_id: id,
            repo_id: 1,
            number: id,
            updated_at: Some(updated_at.into()),
            ..Issue::default()
        }
    }

    #[test]
    fn test_malformed_updated_at_is_scored_once() {
        let store = seeded_store();
        store.upsert_issue(&plain_issue(1, "not a date")).unwrap();

        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 1);
        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 0);
        assert_eq!(drain_dirty(&store, 1).unwrap(), 0);
    }

    #[test]
    fn test_future_updated_at_is_clean_after_scoring() {
        let store = seeded_store();
        let ahead = now() + Duration::days(30);
        store
            .upsert_issue(&plain_issue(1, &crate::store::format_timestamp(ahead)))
            .unwrap();

        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 1);
        assert!(store.get_dirty_issues(500).unwrap().is_empty());
        assert_eq!(store.get_issue_features(1).unwrap().unwrap().computed_at, ahead);
    }

    #[test]
    fn test_drain_stops_when_issues_never_become_clean() {
        let store = seeded_store();
        store.upsert_issue(&plain_issue(1, "2020-01-01T00:00:00Z")).unwrap();
        store
            .lock()
            .execute_batch(
                "CREATE TRIGGER bump_after_insert AFTER INSERT ON issue_features
                 BEGIN
                     UPDATE issues SET updated_at = '9999-01-01T00:00:00Z' WHERE issue_id = NEW.issue_id;
                 END;
                 CREATE TRIGGER bump_after_update AFTER UPDATE ON issue_features
                 BEGIN
                     UPDATE issues SET updated_at = '9999-01-01T00:00:00Z' WHERE issue_id = NEW.issue_id;
                 END;",
            )
            .unwrap();

        assert_eq!(drain_dirty(&store, 1).unwrap(), 1);
        assert_eq!(store.get_dirty_issues(500).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_issue_is_skipped_and_stays_dirty() {
        let store = seeded_store();
        for id in 1..=3 {
            store.upsert_issue(&plain_issue(id, "2026-02-01T00:00:00Z")).unwrap();
        }
        store
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_issue_two BEFORE INSERT ON issue_features
                 WHEN NEW.issue_id = 2
                 BEGIN
                     SELECT RAISE(ABORT, 'rejected');
                 END;",
            )
            .unwrap();

        assert_eq!(score_all_dirty_at(&store, 500, now()).unwrap(), 2);
        assert!(store.get_issue_features(1).unwrap().is_some());
        assert!(store.get_issue_features(2).unwrap().is_none());
        assert!(store.get_issue_features(3).unwrap().is_some());

        let dirty: Vec<i64> = store
            .get_dirty_issues(500)
            .unwrap()
            .iter()
            .map(|r| r.issue.issue_id)
            .collect();
        assert_eq!(dirty, vec![2]);
    }

    #[test]
    fn test_build_feature_set_without_body() {
        let record = IssueRecord {
            issue: Issue {
                state: IssueState::Closed,
                comments_count: -1,
                ..Issue::default()
            },
            repo_full_name: "owner/repo".into(),
            stars: 0,
            language: None,
            pushed_at: None,
            archived: false,
        };
        let f = build_feature_set(&record, false, now());
        assert!(!f.has_code_block);
        assert_eq!(f.env_detail_count, 0);
        assert_eq!(f.comments_count, 0);
        assert_eq!(f.days_old, 0.0);
        assert_eq!(engine::score(&f).score, 40.0);
    }
}
