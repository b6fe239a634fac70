//! SQLite persistence for repositories, issues, comments and scored features.
//!
//! A single connection sits behind a mutex, so writers serialise here and each
//! upsert is one statement. Long batch jobs only hold the lock per statement,
//! which keeps search and detail reads responsive while a job runs.

pub mod schema;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

use crate::models::{
    AuthorAssociation, Comment, Grade, Issue, IssueFeatures, IssueRecord, IssueRow,
    IssueState, RepoSummary, Repository, SearchFilters,
};

/// Columns shared by every query that materialises an [`Issue`].
const ISSUE_COLUMNS: &str = "i.issue_id, i.repo_id, i.number, i.title, i.body, i.state,
    i.user_login, i.labels, i.comments_count, i.html_url,
    i.created_at, i.updated_at, i.closed_at";

/// A search candidate: an issue id that passed the filters, with its persisted score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub issue_id: i64,
    pub fixability_score: f64,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and apply migrations.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        schema::initialize_schema(&conn).context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Direct access to the connection, for maintenance and tests.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub fn upsert_repo(&self, repo: &Repository) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO repos (repo_id, full_name, owner, name, stars, forks,
                                open_issues_count, language, pushed_at, updated_at, archived, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(repo_id) DO UPDATE SET
                 full_name = excluded.full_name, owner = excluded.owner, name = excluded.name,
                 stars = excluded.stars, forks = excluded.forks,
                 open_issues_count = excluded.open_issues_count, language = excluded.language,
                 pushed_at = excluded.pushed_at, updated_at = excluded.updated_at,
                 archived = excluded.archived, last_synced_at = excluded.last_synced_at",
            params![
                repo.repo_id,
                repo.full_name,
                repo.owner,
                repo.name,
                repo.stars,
                repo.forks,
                repo.open_issues_count,
                repo.language,
                normalize_timestamp(repo.pushed_at.as_deref()),
                normalize_timestamp(repo.updated_at.as_deref()),
                repo.archived as i64,
                format_timestamp(Utc::now()),
            ],
        )
        .with_context(|| format!("Failed to upsert repo {}", repo.full_name))?;
        Ok(())
    }

    /// Insert or refresh an issue. `created_at` is never rewritten by a re-sync.
    pub fn upsert_issue(&self, issue: &Issue) -> Result<()> {
        let labels = serde_json::to_string(&issue.labels)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO issues (issue_id, repo_id, number, title, body, state,
                                 user_login, labels, comments_count, html_url,
                                 created_at, updated_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(issue_id) DO UPDATE SET
                 title = excluded.title, body = excluded.body, state = excluded.state,
                 user_login = excluded.user_login, labels = excluded.labels,
                 comments_count = excluded.comments_count, html_url = excluded.html_url,
                 updated_at = excluded.updated_at, closed_at = excluded.closed_at",
            params![
                issue.issue_id,
                issue.repo_id,
                issue.number,
                issue.title,
                issue.body,
                issue.state.as_str(),
                issue.user_login,
                labels,
                issue.comments_count,
                issue.html_url,
                normalize_timestamp(issue.created_at.as_deref()),
                normalize_timestamp(issue.updated_at.as_deref()),
                normalize_timestamp(issue.closed_at.as_deref()),
            ],
        )
        .with_context(|| format!("Failed to upsert issue {}", issue.issue_id))?;
        Ok(())
    }

    pub fn upsert_comment(&self, comment: &Comment) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO comments (comment_id, issue_id, body, user_login,
                                   author_association, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(comment_id) DO UPDATE SET
                 body = excluded.body, user_login = excluded.user_login,
                 author_association = excluded.author_association,
                 updated_at = excluded.updated_at",
            params![
                comment.comment_id,
                comment.issue_id,
                comment.body,
                comment.user_login,
                comment.author_association.as_str(),
                normalize_timestamp(comment.created_at.as_deref()),
                normalize_timestamp(comment.updated_at.as_deref()),
            ],
        )
        .with_context(|| format!("Failed to upsert comment {}", comment.comment_id))?;
        Ok(())
    }

    /// Replace the scored row for an issue as one unit.
    pub fn upsert_issue_features(&self, features: &IssueFeatures) -> Result<()> {
        let reasons = serde_json::to_string(&features.reasons)?;
        let feature_json = serde_json::to_string(&features.features)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO issue_features (issue_id, fixability_score, grade, reasons, features, computed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(issue_id) DO UPDATE SET
                 fixability_score = excluded.fixability_score, grade = excluded.grade,
                 reasons = excluded.reasons, features = excluded.features,
                 computed_at = excluded.computed_at",
            params![
                features.issue_id,
                features.fixability_score,
                features.grade.as_str(),
                reasons,
                feature_json,
                format_timestamp(features.computed_at),
            ],
        )
        .with_context(|| format!("Failed to upsert features for issue {}", features.issue_id))?;
        Ok(())
    }

    /// Issues with no features row, or updated after they were last scored.
    pub fn get_dirty_issues(&self, limit: usize) -> Result<Vec<IssueRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {ISSUE_COLUMNS},
                    r.full_name, r.stars, r.language, r.pushed_at, r.archived
             FROM issues i
             JOIN repos r ON i.repo_id = r.repo_id
             LEFT JOIN issue_features f ON i.issue_id = f.issue_id
             WHERE f.issue_id IS NULL
                OR i.updated_at > f.computed_at
             ORDER BY i.issue_id
             LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([limit as i64], |row| {
            Ok(IssueRecord {
                issue: issue_from_row(row)?,
                repo_full_name: row.get(13)?,
                stars: row.get(14)?,
                language: row.get(15)?,
                pushed_at: row.get(16)?,
                archived: row.get::<_, i64>(17)? != 0,
            })
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Comments on an issue, oldest first.
    pub fn get_comments_for_issue(&self, issue_id: i64) -> Result<Vec<Comment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT comment_id, issue_id, body, user_login, author_association,
                    created_at, updated_at
             FROM comments WHERE issue_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map([issue_id], |row| {
            Ok(Comment {
                comment_id: row.get(0)?,
                issue_id: row.get(1)?,
                body: row.get(2)?,
                user_login: row.get(3)?,
                author_association: AuthorAssociation::parse(&row.get::<_, String>(4)?),
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })?;
        let comments = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }

    pub fn get_issue_features(&self, issue_id: i64) -> Result<Option<IssueFeatures>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT issue_id, fixability_score, grade, reasons, features, computed_at
                 FROM issue_features WHERE issue_id = ?1",
                [issue_id],
                |row| {
                    Ok(IssueFeatures {
                        issue_id: row.get(0)?,
                        fixability_score: row.get(1)?,
                        grade: Grade::parse(&row.get::<_, String>(2)?),
                        reasons: parse_json_or_default(&row.get::<_, String>(3)?),
                        features: parse_json_or_default(&row.get::<_, String>(4)?),
                        computed_at: parse_timestamp(&row.get::<_, String>(5)?)
                            .unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// `(issue_id, number)` for every issue in a repo that has comments upstream.
    pub fn issues_with_comments(&self, repo_id: i64) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT issue_id, number FROM issues
             WHERE repo_id = ?1 AND comments_count > 0
             ORDER BY issue_id",
        )?;
        let rows = stmt.query_map([repo_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let pairs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pairs)
    }

    /// Fully joined row for one issue, addressed the way the hosting platform addresses it.
    pub fn get_issue_by_repo_and_number(
        &self,
        owner: &str,
        name: &str,
        number: i64,
    ) -> Result<Option<IssueRow>> {
        let conn = self.conn.lock();
        let sql = format!("{} WHERE r.owner = ?1 AND r.name = ?2 AND i.number = ?3", joined_select());
        let row = conn
            .query_row(&sql, params![owner, name, number], issue_row_from_row)
            .optional()?;
        Ok(row)
    }

    /// Apply the relational filters to the given ids. Unscored issues get score 0.
    ///
    /// Results come back in storage (issue id) order; the length is the filtered total.
    pub fn search_candidates(&self, issue_ids: &[i64], filters: &SearchFilters) -> Result<Vec<Candidate>> {
        if issue_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut where_clauses = vec!["i.issue_id IN (SELECT value FROM json_each(?1))".to_string()];
        let mut values: Vec<String> = vec![serde_json::to_string(issue_ids)?];

        if let Some(language) = filters.language.as_deref().filter(|l| !l.is_empty()) {
            values.push(language.to_string());
            where_clauses.push(format!("lower(r.language) = lower(?{})", values.len()));
        }
        if let Some(state) = filters.state {
            values.push(state.as_str().to_string());
            where_clauses.push(format!("i.state = ?{}", values.len()));
        }
        for label in filters.labels.iter().filter(|l| !l.is_empty()) {
            values.push(label.clone());
            where_clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(i.labels) AS l WHERE lower(l.value) = lower(?{}))",
                values.len()
            ));
        }

        let sql = format!(
            "SELECT i.issue_id, COALESCE(f.fixability_score, 0)
             FROM issues i
             JOIN repos r ON i.repo_id = r.repo_id
             LEFT JOIN issue_features f ON i.issue_id = f.issue_id
             WHERE {}
             ORDER BY i.issue_id",
            where_clauses.join(" AND ")
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(Candidate {
                issue_id: row.get(0)?,
                fixability_score: row.get(1)?,
            })
        })?;
        let candidates = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }

    /// Load joined rows for the given ids, returned in the order of `issue_ids`.
    pub fn load_issue_rows(&self, issue_ids: &[i64]) -> Result<Vec<IssueRow>> {
        if issue_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock();
        let sql = format!(
            "{} WHERE i.issue_id IN (SELECT value FROM json_each(?1))",
            joined_select()
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([serde_json::to_string(issue_ids)?], issue_row_from_row)?;
        let mut loaded = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        loaded.sort_by_key(|row| {
            issue_ids
                .iter()
                .position(|id| *id == row.issue.issue_id)
                .unwrap_or(usize::MAX)
        });
        Ok(loaded)
    }
}

/// Issue + repo + features, with left-join defaults (score 0, grade F).
fn joined_select() -> String {
    format!(
        "SELECT {ISSUE_COLUMNS},
                r.full_name, r.stars, r.open_issues_count, r.language, r.pushed_at, r.archived,
                COALESCE(f.fixability_score, 0), COALESCE(f.grade, 'F'),
                COALESCE(f.reasons, '[]'), COALESCE(f.features, '{{}}')
         FROM issues i
         JOIN repos r ON i.repo_id = r.repo_id
         LEFT JOIN issue_features f ON i.issue_id = f.issue_id"
    )
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        issue_id: row.get(0)?,
        repo_id: row.get(1)?,
        number: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        state: IssueState::parse(&row.get::<_, String>(5)?),
        user_login: row.get(6)?,
        labels: parse_json_or_default(&row.get::<_, String>(7)?),
        comments_count: row.get(8)?,
        html_url: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        closed_at: row.get(12)?,
    })
}

fn issue_row_from_row(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        issue: issue_from_row(row)?,
        repo: RepoSummary {
            full_name: row.get(13)?,
            stars: row.get(14)?,
            open_issues: row.get(15)?,
            language: row.get(16)?,
            pushed_at: row.get(17)?,
            archived: row.get::<_, i64>(18)? != 0,
        },
        fixability_score: row.get(19)?,
        grade: Grade::parse(&row.get::<_, String>(20)?),
        reasons: parse_json_or_default(&row.get::<_, String>(21)?),
        features: parse_json_or_default(&row.get::<_, String>(22)?),
    })
}

/// Malformed JSON columns read as the type's neutral value.
fn parse_json_or_default<T: serde::de::DeserializeOwned + Default>(raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Canonical stored form: RFC 3339, UTC, whole seconds, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Rewrite a timestamp into canonical form so stored values compare lexically.
/// Empty or unparseable input becomes NULL.
pub fn normalize_timestamp(raw: Option<&str>) -> Option<String> {
    raw.and_then(parse_timestamp).map(format_timestamp)
}
