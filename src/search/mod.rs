//! Query path: lexical matching in the issue index, relational filtering in
//! the store, then ranking by fixability or by a relevance/fixability blend.

pub mod index;
pub mod ranking;

use anyhow::Result;

use crate::models::{
    snippet, IssueResult, IssueRow, RateLimitInfo, ScoredIssue, SearchFilters, SearchRequest,
    SearchResponse,
};
use crate::scoring::compute_fixability_from_db;
use crate::store::Store;
use index::IssueIndex;
use ranking::{rank, BlendWeights, SortBy};

pub const MAX_PER_PAGE: usize = 100;
const BODY_SNIPPET_CHARS: usize = 300;

/// Match, filter, rank and page. Returns the page rows and the filtered total.
#[allow(clippy::too_many_arguments)]
pub fn search_fts(
    store: &Store,
    index: &IssueIndex,
    query: &str,
    filters: &SearchFilters,
    sort: SortBy,
    weights: BlendWeights,
    limit: usize,
    offset: usize,
) -> Result<(Vec<IssueRow>, usize)> {
    let relevance = index.search_all(query)?;
    if relevance.is_empty() {
        return Ok((Vec::new(), 0));
    }

    let ids: Vec<i64> = relevance.keys().copied().collect();
    let mut candidates = store.search_candidates(&ids, filters)?;
    let total_count = candidates.len();

    rank(&mut candidates, &relevance, sort, weights);

    let page_ids: Vec<i64> = candidates
        .iter()
        .skip(offset)
        .take(limit)
        .map(|c| c.issue_id)
        .collect();
    let rows = store.load_issue_rows(&page_ids)?;

    Ok((rows, total_count))
}

/// Run a search request. Any failure degrades to an empty response.
pub fn search_issues(
    store: &Store,
    index: &IssueIndex,
    weights: BlendWeights,
    req: &SearchRequest,
    rate_limit: RateLimitInfo,
) -> SearchResponse {
    let filters = SearchFilters {
        language: req.language.clone().filter(|l| !l.trim().is_empty()),
        state: req.state,
        labels: req.labels.clone().unwrap_or_default(),
    };
    let page = req.page.max(1);
    let per_page = req.per_page.clamp(1, MAX_PER_PAGE);
    let offset = (page - 1) * per_page;

    match search_fts(
        store,
        index,
        &req.query,
        &filters,
        SortBy::parse(&req.sort_by),
        weights,
        per_page,
        offset,
    ) {
        Ok((rows, total_count)) => SearchResponse {
            total_count,
            items: rows.iter().map(issue_row_to_scored).collect(),
            rate_limit,
        },
        Err(e) => {
            tracing::warn!("Search failed for query {:?}: {e:#}", req.query);
            SearchResponse {
                total_count: 0,
                items: Vec::new(),
                rate_limit,
            }
        }
    }
}

pub fn issue_row_to_result(row: &IssueRow) -> IssueResult {
    let issue = &row.issue;
    IssueResult {
        number: issue.number,
        title: issue.title.clone(),
        html_url: issue.html_url.clone(),
        state: issue.state,
        created_at: issue.created_at.clone().unwrap_or_default(),
        updated_at: issue.updated_at.clone().unwrap_or_default(),
        comments: issue.comments_count,
        labels: issue.labels.clone(),
        user: issue.user_login.clone(),
        body_snippet: snippet(&issue.body, BODY_SNIPPET_CHARS),
        repo_full_name: row.repo.full_name.clone(),
    }
}

pub fn issue_row_to_scored(row: &IssueRow) -> ScoredIssue {
    ScoredIssue {
        issue: issue_row_to_result(row),
        repo_summary: row.repo.clone(),
        fixability: compute_fixability_from_db(row.fixability_score, row.grade, &row.features),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Issue, Repository};

    fn fixture() -> (Store, IssueIndex) {
        let store = Store::open_in_memory().unwrap();
        let index = IssueIndex::in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: 1,
                full_name: "owner/repo".into(),
                owner: "owner".into(),
                name: "repo".into(),
                ..Repository::default()
            })
            .unwrap();

        let issues: Vec<Issue> = (1..=5)
            .map(|n| Issue {
                issue_id: n,
                repo_id: 1,
                number: n,
                title: format!("crash number {n}"),
                body: "x".repeat(500),
                ..Issue::default()
            })
            .collect();
        for issue in &issues {
            store.upsert_issue(issue).unwrap();
        }
        index.index_issues(&issues).unwrap();
        (store, index)
    }

    #[test]
    fn test_pagination_and_total() {
        let (store, index) = fixture();
        let mut req = SearchRequest::new("crash");
        req.per_page = 2;
        req.page = 3;

        let resp = search_issues(&store, &index, BlendWeights::default(), &req, RateLimitInfo::default());
        assert_eq!(resp.total_count, 5);
        assert_eq!(resp.items.len(), 1);
        // Unscored issues tie at 0 and keep storage order
        assert_eq!(resp.items[0].issue.number, 5);
        assert_eq!(resp.items[0].issue.body_snippet.chars().count(), 300);
        assert_eq!(resp.items[0].fixability.grade, crate::models::Grade::F);
    }

    #[test]
    fn test_page_and_per_page_are_clamped() {
        let (store, index) = fixture();
        let mut req = SearchRequest::new("crash");
        req.page = 0;
        req.per_page = 0;

        let resp = search_issues(&store, &index, BlendWeights::default(), &req, RateLimitInfo::default());
        assert_eq!(resp.total_count, 5);
        assert_eq!(resp.items.len(), 1);
        assert_eq!(resp.items[0].issue.number, 1);
    }

    #[test]
    fn test_no_match_is_empty() {
        let (store, index) = fixture();
        let resp = search_issues(
            &store,
            &index,
            BlendWeights::default(),
            &SearchRequest::new("nonexistentterm"),
            RateLimitInfo::default(),
        );
        assert_eq!(resp.total_count, 0);
        assert!(resp.items.is_empty());
    }

    #[test]
    fn test_storage_fault_degrades() {
        let (store, index) = fixture();
        store.lock().execute_batch("DROP TABLE issue_features").unwrap();

        let resp = search_issues(
            &store,
            &index,
            BlendWeights::default(),
            &SearchRequest::new("crash"),
            RateLimitInfo::default(),
        );
        assert_eq!(resp.total_count, 0);
        assert!(resp.items.is_empty());
    }

    #[test]
    fn test_index_fault_degrades() {
        let (store, _) = fixture();
        let dir = tempfile::tempdir().unwrap();
        {
            // An index whose issue id field has no fast-field column cannot resolve hits.
            use tantivy::schema::{Schema, INDEXED, STORED, TEXT};
            let mut builder = Schema::builder();
            builder.add_u64_field("issue_id", INDEXED | STORED);
            builder.add_text_field("title", TEXT);
            builder.add_text_field("body", TEXT);
            tantivy::Index::create_in_dir(dir.path(), builder.build()).unwrap();
        }
        let index = IssueIndex::open_or_create(dir.path()).unwrap();
        index
            .index_issues(&[Issue {
                issue_id: 1,
                repo_id: 1,
                number: 1,
                title: "crash".into(),
                ..Issue::default()
            }])
            .unwrap();

        let resp = search_issues(
            &store,
            &index,
            BlendWeights::default(),
            &SearchRequest::new("crash"),
            RateLimitInfo::default(),
        );
        assert_eq!(resp.total_count, 0);
        assert!(resp.items.is_empty());
    }
}
