use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::github::client::GitHubClient;
use crate::models::Issue;
use crate::search::index::IssueIndex;
use crate::store::Store;

/// Counts reported at the end of a sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub repos: usize,
    pub issues: usize,
    pub comments: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub max_pages: u32,
    pub max_concurrency: usize,
}

/// Run blocking store/index work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task panicked")?
}

/// `(owner, name)` pairs from the first column of each line.
///
/// Lines starting with `#` and lines without a `/` are ignored.
pub fn parse_repo_list(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(|line| {
            let first = line.split(',').next().unwrap_or_default().trim().trim_matches('"').trim();
            if first.starts_with('#') {
                return None;
            }
            let (owner, name) = first.split_once('/')?;
            let (owner, name) = (owner.trim(), name.trim());
            if owner.is_empty() || name.is_empty() {
                return None;
            }
            Some((owner.to_string(), name.to_string()))
        })
        .collect()
}

pub fn load_repos_from_csv(path: &Path) -> Result<Vec<(String, String)>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read repo list {}", path.display()))?;
    Ok(parse_repo_list(&contents))
}

/// Fetch and upsert repository metadata. Returns the repo id.
async fn sync_repo_metadata(client: &GitHubClient, store: &Arc<Store>, owner: &str, name: &str) -> Result<i64> {
    let repo = client.get_repo(owner, name).await?.into_repository(owner, name);
    let repo_id = repo.repo_id;

    let store = store.clone();
    blocking(move || store.upsert_repo(&repo)).await?;

    tracing::info!("Synced repo {owner}/{name} (id={repo_id})");
    Ok(repo_id)
}

/// Page through issues, upserting and indexing each page. Stops on an empty page or an error.
async fn sync_issues(
    client: &GitHubClient,
    store: &Arc<Store>,
    index: &Arc<IssueIndex>,
    owner: &str,
    name: &str,
    repo_id: i64,
    max_pages: u32,
) -> usize {
    let mut count = 0;

    for page in 1..=max_pages {
        let items = match client.list_issues_page(owner, name, page).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Failed to fetch issues page {page} for {owner}/{name}: {e:#}");
                break;
            }
        };
        if items.is_empty() {
            break;
        }

        let issues: Vec<Issue> = items
            .into_iter()
            .filter(|item| !item.is_pull_request())
            .map(|item| item.into_issue(repo_id))
            .collect();

        let store = store.clone();
        let index = index.clone();
        let stored = blocking(move || {
            for issue in &issues {
                store.upsert_issue(issue)?;
            }
            index.index_issues(&issues)?;
            Ok(issues.len())
        })
        .await;

        match stored {
            Ok(n) => count += n,
            Err(e) => {
                tracing::warn!("Failed to store issues page {page} for {owner}/{name}: {e:#}");
                break;
            }
        }
    }

    tracing::info!("Synced {count} issues for {owner}/{name}");
    count
}

/// Fetch and upsert comments for one issue. Failures count as zero.
async fn sync_comments_for_issue(
    client: &GitHubClient,
    store: &Arc<Store>,
    owner: &str,
    name: &str,
    issue_id: i64,
    number: i64,
) -> usize {
    let fetched = match client.list_comments(owner, name, number).await {
        Ok(comments) => comments,
        Err(e) => {
            tracing::warn!("Failed to fetch comments for {owner}/{name}#{number}: {e:#}");
            return 0;
        }
    };

    let store = store.clone();
    let stored = blocking(move || {
        let n = fetched.len();
        for comment in fetched {
            store.upsert_comment(&comment.into_comment(issue_id))?;
        }
        Ok(n)
    })
    .await;

    stored.unwrap_or_else(|e| {
        tracing::warn!("Failed to store comments for {owner}/{name}#{number}: {e:#}");
        0
    })
}

/// Sync one repository: metadata, issue pages, then comments in parallel.
async fn sync_repo(
    client: &GitHubClient,
    store: &Arc<Store>,
    index: &Arc<IssueIndex>,
    owner: &str,
    name: &str,
    opts: SyncOptions,
) -> Result<SyncStats> {
    let repo_id = sync_repo_metadata(client, store, owner, name).await?;
    let issues = sync_issues(client, store, index, owner, name, repo_id, opts.max_pages).await;

    let with_comments = {
        let store = store.clone();
        blocking(move || store.issues_with_comments(repo_id)).await?
    };

    let comments: usize = stream::iter(with_comments)
        .map(|(issue_id, number)| sync_comments_for_issue(client, store, owner, name, issue_id, number))
        .buffer_unordered(opts.max_concurrency.max(1))
        .collect::<Vec<usize>>()
        .await
        .into_iter()
        .sum();

    Ok(SyncStats {
        repos: 1,
        issues,
        comments,
    })
}

/// Sync every repository listed in the CSV. A failing repository is logged and skipped.
pub async fn run_full_sync(
    client: &GitHubClient,
    store: Arc<Store>,
    index: Arc<IssueIndex>,
    csv_path: &Path,
    opts: SyncOptions,
) -> Result<SyncStats> {
    let repos = load_repos_from_csv(csv_path)?;
    tracing::info!("Syncing {} repos from {}", repos.len(), csv_path.display());

    let mut stats = SyncStats::default();
    for (owner, name) in &repos {
        match sync_repo(client, &store, &index, owner, name, opts).await {
            Ok(repo_stats) => {
                stats.repos += repo_stats.repos;
                stats.issues += repo_stats.issues;
                stats.comments += repo_stats.comments;
            }
            Err(e) => tracing::warn!("Failed to sync {owner}/{name}: {e:#}"),
        }
    }

    tracing::info!(
        "Full sync complete: {} repos, {} issues, {} comments",
        stats.repos,
        stats.issues,
        stats.comments
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_list() {
        let csv = "# curated list\nrust-lang/rust,systems\n\"tokio-rs/tokio\"\nnot a repo\n  serde-rs/json  \n/missing-owner\n";
        let repos = parse_repo_list(csv);
        assert_eq!(
            repos,
            vec![
                ("rust-lang".to_string(), "rust".to_string()),
                ("tokio-rs".to_string(), "tokio".to_string()),
                ("serde-rs".to_string(), "json".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_repos_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repos.csv");
        std::fs::write(&path, "owner/repo\n#skipped/repo\n").unwrap();

        let repos = load_repos_from_csv(&path).unwrap();
        assert_eq!(repos, vec![("owner".to_string(), "repo".to_string())]);
        assert!(load_repos_from_csv(&dir.path().join("missing.csv")).is_err());
    }
}
