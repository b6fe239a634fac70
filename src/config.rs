use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the database and search index are stored
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// CSV file listing `owner/repo` lines to sync
    pub repos_csv_path: PathBuf,
    /// GitHub API configuration
    pub github: GitHubConfig,
    /// Cap on parallel comment fetches during a sync
    pub max_concurrency: usize,
    /// Weight of lexical relevance in blended ranking
    pub text_score_weight: f64,
    /// Weight of the fixability score in blended ranking
    pub fixability_score_weight: f64,
    /// Dirty issues scored per batch
    pub score_batch_limit: usize,
    /// Periodic scoring interval for `serve` (0 = disabled)
    pub score_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub api_base: String,
    /// Personal access token, sent as a bearer token when present
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Pages of 100 issues fetched per repo
    pub max_pages: u32,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token: None,
            timeout_secs: 30,
            max_pages: 5,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:8000".to_string(),
            repos_csv_path: PathBuf::from("repos.csv"),
            github: GitHubConfig::default(),
            max_concurrency: 15,
            text_score_weight: 0.65,
            fixability_score_weight: 0.35,
            score_batch_limit: 500,
            score_interval_secs: 0,
        }
    }
}

/// Parse an env var, keeping `current` when unset or malformed.
fn env_parse<T: std::str::FromStr>(key: &str, current: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("FIXABILITY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("FIXABILITY_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(path) = std::env::var("REPOS_CSV_PATH") {
            config.repos_csv_path = PathBuf::from(path);
        }

        // GitHub
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.trim().is_empty() {
                config.github.token = Some(token.trim().to_string());
            }
        }
        if let Ok(base) = std::env::var("GITHUB_API_BASE") {
            config.github.api_base = base.trim_end_matches('/').to_string();
        }
        config.github.timeout_secs = env_parse("GITHUB_TIMEOUT_SECS", config.github.timeout_secs);
        config.github.max_pages = env_parse("GITHUB_MAX_PAGES", config.github.max_pages);

        config.max_concurrency = env_parse("MAX_CONCURRENCY", config.max_concurrency).max(1);
        config.text_score_weight = env_parse("TEXT_SCORE_WEIGHT", config.text_score_weight);
        config.fixability_score_weight =
            env_parse("FIXABILITY_SCORE_WEIGHT", config.fixability_score_weight);
        config.score_batch_limit = env_parse("SCORE_BATCH_LIMIT", config.score_batch_limit).max(1);
        config.score_interval_secs = env_parse("SCORE_INTERVAL_SECS", config.score_interval_secs);

        config
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("fixability.db")
    }
}
