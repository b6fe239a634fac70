use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GitHubConfig;
use crate::models::{AuthorAssociation, Comment, Issue, IssueState, RateLimitInfo, Repository};

/// How aggressively the remaining API budget may be spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetMode {
    Full,
    Conserve,
    Minimal,
}

impl BudgetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetMode::Full => "full",
            BudgetMode::Conserve => "conserve",
            BudgetMode::Minimal => "minimal",
        }
    }
}

/// Last rate-limit headers seen on any response.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    info: RwLock<RateLimitInfo>,
}

impl RateLimitTracker {
    pub fn update(&self, headers: &HeaderMap) {
        let header_i64 = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };

        let mut info = self.info.write();
        if let Some(remaining) = header_i64("x-ratelimit-remaining") {
            info.remaining = remaining;
        }
        if let Some(limit) = header_i64("x-ratelimit-limit") {
            info.limit = limit;
        }
        if let Some(reset) = header_i64("x-ratelimit-reset") {
            info.reset_at = DateTime::<Utc>::from_timestamp(reset, 0);
        }
    }

    pub fn snapshot(&self) -> RateLimitInfo {
        self.info.read().clone()
    }

    /// Unknown (negative) or >200 remaining is `Full`, >50 is `Conserve`.
    pub fn budget_mode(&self) -> BudgetMode {
        let remaining = self.info.read().remaining;
        if remaining < 0 || remaining > 200 {
            BudgetMode::Full
        } else if remaining > 50 {
            BudgetMode::Conserve
        } else {
            BudgetMode::Minimal
        }
    }
}

// ─── Wire types ──────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct GhUser {
    #[serde(default)]
    pub login: String,
}

/// Labels arrive as objects, but plain strings are accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GhLabel {
    Named {
        #[serde(default)]
        name: String,
    },
    Plain(String),
}

impl GhLabel {
    pub fn name(&self) -> &str {
        match self {
            GhLabel::Named { name } => name,
            GhLabel::Plain(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GhRepo {
    pub id: i64,
    pub full_name: Option<String>,
    #[serde(default)]
    pub stargazers_count: i64,
    #[serde(default)]
    pub forks_count: i64,
    #[serde(default)]
    pub open_issues_count: i64,
    pub language: Option<String>,
    pub pushed_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl GhRepo {
    pub fn into_repository(self, owner: &str, name: &str) -> Repository {
        Repository {
            repo_id: self.id,
            full_name: self.full_name.unwrap_or_else(|| format!("{owner}/{name}")),
            owner: owner.to_string(),
            name: name.to_string(),
            stars: self.stargazers_count,
            forks: self.forks_count,
            open_issues_count: self.open_issues_count,
            language: self.language,
            pushed_at: self.pushed_at,
            updated_at: self.updated_at,
            archived: self.archived,
            last_synced_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GhIssue {
    pub id: i64,
    pub number: i64,
    #[serde(default)]
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub state: String,
    pub user: Option<GhUser>,
    #[serde(default)]
    pub labels: Vec<GhLabel>,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub html_url: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
    pub pull_request: Option<serde_json::Value>,
}

impl GhIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.as_ref().is_some_and(|v| !v.is_null())
    }

    pub fn into_issue(self, repo_id: i64) -> Issue {
        Issue {
            issue_id: self.id,
            repo_id,
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: IssueState::parse(&self.state),
            user_login: self.user.map(|u| u.login).unwrap_or_default(),
            labels: self.labels.iter().map(|l| l.name().to_string()).collect(),
            comments_count: self.comments,
            html_url: self.html_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GhComment {
    pub id: i64,
    pub body: Option<String>,
    pub user: Option<GhUser>,
    #[serde(default)]
    pub author_association: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl GhComment {
    pub fn into_comment(self, issue_id: i64) -> Comment {
        Comment {
            comment_id: self.id,
            issue_id,
            body: self.body.unwrap_or_default(),
            user_login: self.user.map(|u| u.login).unwrap_or_default(),
            author_association: AuthorAssociation::parse(&self.author_association),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

// ─── Client ──────────────────────────────────────────────

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    rate_limit: RateLimitTracker,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        headers.insert(USER_AGENT, HeaderValue::from_static("fixability-search"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("GITHUB_TOKEN contains invalid header characters")?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build GitHub HTTP client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            rate_limit: RateLimitTracker::default(),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    /// GET a path under the API base. Every response feeds the rate-limit tracker.
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.api_base);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to call GitHub API {path}"))?;

        self.rate_limit.update(resp.headers());

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API {path} returned {status}: {body}");
        }
        Ok(resp)
    }

    pub async fn get_repo(&self, owner: &str, name: &str) -> Result<GhRepo> {
        self.get(&format!("/repos/{owner}/{name}"), &[])
            .await?
            .json()
            .await
            .context("Failed to parse repository response")
    }

    /// One page of issues (pull requests included), most recently updated first.
    pub async fn list_issues_page(&self, owner: &str, name: &str, page: u32) -> Result<Vec<GhIssue>> {
        let query = [
            ("state", "all".to_string()),
            ("per_page", "100".to_string()),
            ("page", page.to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
        ];
        self.get(&format!("/repos/{owner}/{name}/issues"), &query)
            .await?
            .json()
            .await
            .context("Failed to parse issues response")
    }

    pub async fn list_comments(&self, owner: &str, name: &str, number: i64) -> Result<Vec<GhComment>> {
        self.get(
            &format!("/repos/{owner}/{name}/issues/{number}/comments"),
            &[("per_page", "100".to_string())],
        )
        .await?
        .json()
        .await
        .context("Failed to parse comments response")
    }

    pub async fn get_rate_limit(&self) -> Result<serde_json::Value> {
        self.get("/rate_limit", &[])
            .await?
            .json()
            .await
            .context("Failed to parse rate limit response")
    }
}
