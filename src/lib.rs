//! # fixability-search
//!
//! A Rust service that pulls issues from GitHub repositories, scores how
//! fixable each one looks from textual and social signals, and serves ranked
//! full-text search over them.
//!
//! ## Architecture
//!
//! Ingestion and scoring are batch jobs; search reads whatever they last wrote:
//!
//! ```text
//!    repos.csv ──► GitHub REST ──► repos / issues / comments ──► tantivy index
//!                  (rate-limit        (SQLite upserts)           (title + body)
//!                   tracked)                 │
//!                                            ▼
//!                              ┌───────────────────────────┐
//!                              │  Dirty issues             │
//!                              │  no features row, or      │
//!                              │  updated_at > computed_at │
//!                              └─────────────┬─────────────┘
//!                                            │ batches of 500
//!                                            ▼
//!                  ┌─────────────────────────────────────────────┐
//!                  │ Feature extraction (regex over issue body)  │
//!                  │ + maintainer reply + labels/state/age       │
//!                  └─────────────────────┬───────────────────────┘
//!                                        ▼
//!                  ┌─────────────────────────────────────────────┐
//!                  │ Score engine: 50 ± ordered adjustments      │
//!                  │ clamp [0, 100] → grade A-F + reasons        │
//!                  └─────────────────────┬───────────────────────┘
//!                                        ▼
//!                               issue_features row
//!
//!    query ──► BM25 match ──► filters (language, state, ALL labels)
//!                                        │
//!                        ┌───────────────┴───────────────┐
//!                        ▼                               ▼
//!              sort_by = "fixability"          anything else
//!              persisted score desc            0.65·rel + 0.35·score/100
//!                        └───────────────┬───────────────┘
//!                                        ▼
//!                             page (LIMIT / OFFSET)
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for data dirs, GitHub access and ranking weights
//! - [`models`] - Shared data types: `Issue`, `Comment`, `FeatureSet`, request/response types
//! - [`store`] - SQLite persistence, the dirty-issue query, and search candidate/page queries
//! - [`scoring::features`] - Regex text signals (repro steps, stack traces, code blocks, env details)
//! - [`scoring::engine`] - The additive score as a static ordered adjustment table
//! - [`scoring::pipeline`] - Batch scoring of dirty issues
//! - [`scoring::breakdown`] - Display-only repo_health / issue_signals / code_context buckets
//! - [`search::index`] - BM25 full-text index over issue title and body, powered by tantivy
//! - [`search::ranking`] - Fixability and blended ranking strategies
//! - [`github`] - REST client, rate-limit tracking, and the repo/issue/comment sync
//! - [`jobs`] - In-memory status of background sync and score jobs
//! - [`api`] - Axum HTTP handlers for search, issue detail, jobs, and rate limits
//! - [`state`] - Shared application state holding the store, index and client

pub mod api;
pub mod config;
pub mod github;
pub mod jobs;
pub mod models;
pub mod scoring;
pub mod search;
pub mod state;
pub mod store;
