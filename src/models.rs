use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    #[default]
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }

    /// Unknown values fall back to `Open`, matching the upstream default.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        }
    }
}

/// Letter bucket derived from the fixability score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    #[default]
    F,
}

impl Grade {
    /// Thresholds are inclusive at the lower bound.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Grade::A
        } else if score >= 60.0 {
            Grade::B
        } else if score >= 40.0 {
            Grade::C
        } else if score >= 20.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "A" => Grade::A,
            "B" => Grade::B,
            "C" => Grade::C,
            "D" => Grade::D,
            _ => Grade::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a commenter relates to the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimeContributor,
    FirstTimer,
    Mannequin,
    #[default]
    None,
}

impl AuthorAssociation {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorAssociation::Owner => "OWNER",
            AuthorAssociation::Member => "MEMBER",
            AuthorAssociation::Collaborator => "COLLABORATOR",
            AuthorAssociation::Contributor => "CONTRIBUTOR",
            AuthorAssociation::FirstTimeContributor => "FIRST_TIME_CONTRIBUTOR",
            AuthorAssociation::FirstTimer => "FIRST_TIMER",
            AuthorAssociation::Mannequin => "MANNEQUIN",
            AuthorAssociation::None => "NONE",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "OWNER" => AuthorAssociation::Owner,
            "MEMBER" => AuthorAssociation::Member,
            "COLLABORATOR" => AuthorAssociation::Collaborator,
            "CONTRIBUTOR" => AuthorAssociation::Contributor,
            "FIRST_TIME_CONTRIBUTOR" => AuthorAssociation::FirstTimeContributor,
            "FIRST_TIMER" => AuthorAssociation::FirstTimer,
            "MANNEQUIN" => AuthorAssociation::Mannequin,
            _ => AuthorAssociation::None,
        }
    }

    /// Owners, members and collaborators count as maintainers.
    pub fn is_maintainer(&self) -> bool {
        matches!(
            self,
            AuthorAssociation::Owner | AuthorAssociation::Member | AuthorAssociation::Collaborator
        )
    }
}

/// A synced repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: i64,
    pub full_name: String,
    pub owner: String,
    pub name: String,
    pub stars: i64,
    pub forks: i64,
    pub open_issues_count: i64,
    pub language: Option<String>,
    pub pushed_at: Option<String>,
    pub updated_at: Option<String>,
    pub archived: bool,
    pub last_synced_at: Option<String>,
}

/// A synced issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Issue {
    pub issue_id: i64,
    pub repo_id: i64,
    pub number: i64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub user_login: String,
    pub labels: Vec<String>,
    pub comments_count: i64,
    pub html_url: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub closed_at: Option<String>,
}

/// A comment on an issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: i64,
    pub issue_id: i64,
    pub body: String,
    pub user_login: String,
    pub author_association: AuthorAssociation,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Every signal the score engine looks at, persisted as JSON next to the score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSet {
    pub has_steps_to_reproduce: bool,
    pub has_expected_vs_actual: bool,
    pub has_stack_trace: bool,
    pub has_code_block: bool,
    pub env_detail_count: u32,
    pub maintainer_replied: bool,
    pub labels: Vec<String>,
    pub state: IssueState,
    pub comments_count: u32,
    pub days_old: f64,
}

impl FeatureSet {
    /// Case-insensitive label membership.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.to_lowercase() == name)
    }

    pub fn has_any_label(&self, names: &[&str]) -> bool {
        names.iter().any(|n| self.has_label(n))
    }
}

/// The scored view of an issue. Always written as a whole row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueFeatures {
    pub issue_id: i64,
    pub fixability_score: f64,
    pub grade: Grade,
    pub reasons: Vec<String>,
    pub features: FeatureSet,
    pub computed_at: DateTime<Utc>,
}

/// An issue selected for (re)scoring, joined with its repository.
#[derive(Debug, Clone)]
pub struct IssueRecord {
    pub issue: Issue,
    pub repo_full_name: String,
    pub stars: i64,
    pub language: Option<String>,
    pub pushed_at: Option<String>,
    pub archived: bool,
}

/// A fully joined issue row for display, with left-join defaults for unscored issues.
#[derive(Debug, Clone)]
pub struct IssueRow {
    pub issue: Issue,
    pub repo: RepoSummary,
    pub fixability_score: f64,
    pub grade: Grade,
    pub reasons: Vec<String>,
    pub features: FeatureSet,
}

/// Conjunctive search filters. Every listed label must be present.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub state: Option<IssueState>,
    pub labels: Vec<String>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub language: Option<String>,
    pub state: Option<IssueState>,
    pub labels: Option<Vec<String>>,
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_sort_by() -> String {
    "fixability".to_string()
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    30
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            state: None,
            labels: None,
            sort_by: default_sort_by(),
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FixabilityBreakdown {
    pub repo_health: f64,
    pub issue_signals: f64,
    pub code_context: f64,
}

/// Display form of a persisted score (score normalised to 0-1).
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixabilityResult {
    pub score: f64,
    pub grade: Grade,
    pub breakdown: FixabilityBreakdown,
    pub enriched: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoSummary {
    pub full_name: String,
    pub stars: i64,
    pub open_issues: i64,
    pub language: Option<String>,
    pub pushed_at: Option<String>,
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueResult {
    pub number: i64,
    pub title: String,
    pub html_url: String,
    pub state: IssueState,
    pub created_at: String,
    pub updated_at: String,
    pub comments: i64,
    pub labels: Vec<String>,
    pub user: String,
    pub body_snippet: String,
    pub repo_full_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredIssue {
    pub issue: IssueResult,
    pub repo_summary: RepoSummary,
    pub fixability: FixabilityResult,
}

/// Rate-limit snapshot reported alongside search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub remaining: i64,
    pub limit: i64,
    pub reset_at: Option<DateTime<Utc>>,
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self {
            remaining: -1,
            limit: -1,
            reset_at: None,
        }
    }
}

/// Search response
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResponse {
    pub total_count: usize,
    pub items: Vec<ScoredIssue>,
    pub rate_limit: RateLimitInfo,
}

/// A comment rendered as a timeline entry on the detail page
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub event: String,
    pub user: String,
    pub author_association: AuthorAssociation,
    pub body: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueDetailResponse {
    pub issue: IssueResult,
    pub repo_summary: RepoSummary,
    pub fixability: FixabilityResult,
    pub reasons: Vec<String>,
    pub timeline_events: Vec<TimelineEvent>,
}

/// First `max_chars` characters of `text`, on a char boundary.
pub fn snippet(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries_inclusive() {
        assert_eq!(Grade::from_score(80.0), Grade::A);
        assert_eq!(Grade::from_score(79.999), Grade::B);
        assert_eq!(Grade::from_score(60.0), Grade::B);
        assert_eq!(Grade::from_score(59.999), Grade::C);
        assert_eq!(Grade::from_score(40.0), Grade::C);
        assert_eq!(Grade::from_score(20.0), Grade::D);
        assert_eq!(Grade::from_score(19.999), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn test_grade_serializes_as_letter() {
        let json = serde_json::to_value(Grade::B).unwrap();
        assert_eq!(json, "B");
        assert_eq!(Grade::parse("garbage"), Grade::F);
    }

    #[test]
    fn test_issue_state_parse_defaults_to_open() {
        assert_eq!(IssueState::parse("closed"), IssueState::Closed);
        assert_eq!(IssueState::parse("CLOSED"), IssueState::Closed);
        assert_eq!(IssueState::parse("reopened"), IssueState::Open);
        assert_eq!(serde_json::to_value(IssueState::Closed).unwrap(), "closed");
    }

    #[test]
    fn test_author_association_maintainer_roles() {
        assert!(AuthorAssociation::parse("OWNER").is_maintainer());
        assert!(AuthorAssociation::parse("member").is_maintainer());
        assert!(AuthorAssociation::parse("COLLABORATOR").is_maintainer());
        assert!(!AuthorAssociation::parse("CONTRIBUTOR").is_maintainer());
        assert!(!AuthorAssociation::parse("").is_maintainer());
    }

    #[test]
    fn test_feature_set_reads_partial_json() {
        let features: FeatureSet =
            serde_json::from_str(r#"{"has_code_block": true, "labels": ["Bug"]}"#).unwrap();
        assert!(features.has_code_block);
        assert!(features.has_label("bug"));
        assert_eq!(features.state, IssueState::Open);
        assert_eq!(features.comments_count, 0);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        assert_eq!(snippet("héllo wörld", 4), "héll");
        assert_eq!(snippet("", 300), "");
    }
}
