//! GitHub REST ingestion: the HTTP client with its rate-limit tracker, and the
//! sync that pulls repositories, issues and comments into the store and index.

pub mod client;
pub mod ingest;

pub use client::{BudgetMode, GitHubClient, RateLimitTracker};
pub use ingest::{load_repos_from_csv, run_full_sync, SyncOptions, SyncStats};
