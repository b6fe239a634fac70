use anyhow::Context;
use std::sync::Arc;

use crate::config::Config;
use crate::github::{GitHubClient, SyncOptions};
use crate::jobs::JobTracker;
use crate::search::index::IssueIndex;
use crate::search::ranking::BlendWeights;
use crate::store::Store;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub index: Arc<IssueIndex>,
    pub github: Arc<GitHubClient>,
    pub jobs: Arc<JobTracker>,
}

impl AppState {
    /// Open the database and index. Any failure here is fatal for the process.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

        let store = Store::open(&config.db_path())?;
        let index = IssueIndex::open_or_create(&config.index_dir())?;
        let github = GitHubClient::new(&config.github)?;

        Ok(Self {
            config,
            store: Arc::new(store),
            index: Arc::new(index),
            github: Arc::new(github),
            jobs: Arc::new(JobTracker::default()),
        })
    }

    pub fn blend_weights(&self) -> BlendWeights {
        BlendWeights {
            text: self.config.text_score_weight,
            fixability: self.config.fixability_score_weight,
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_pages: self.config.github.max_pages,
            max_concurrency: self.config.max_concurrency,
        }
    }
}
