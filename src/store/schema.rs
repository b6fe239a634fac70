use rusqlite::{Connection, Result};

const DB_SCHEMA_VERSION: i64 = 2;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        tracing::warn!("Database schema version {version} is newer than {DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS repos (
            repo_id INTEGER PRIMARY KEY,
            full_name TEXT NOT NULL,
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            stars INTEGER NOT NULL DEFAULT 0,
            forks INTEGER NOT NULL DEFAULT 0,
            open_issues_count INTEGER NOT NULL DEFAULT 0,
            language TEXT,
            pushed_at TEXT,
            updated_at TEXT,
            archived INTEGER NOT NULL DEFAULT 0,
            last_synced_at TEXT
        );

        CREATE TABLE IF NOT EXISTS issues (
            issue_id INTEGER PRIMARY KEY,
            repo_id INTEGER NOT NULL REFERENCES repos(repo_id),
            number INTEGER NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT 'open',
            user_login TEXT NOT NULL DEFAULT '',
            labels TEXT NOT NULL DEFAULT '[]',
            comments_count INTEGER NOT NULL DEFAULT 0,
            html_url TEXT NOT NULL DEFAULT '',
            created_at TEXT,
            updated_at TEXT,
            closed_at TEXT
        );

        CREATE TABLE IF NOT EXISTS comments (
            comment_id INTEGER PRIMARY KEY,
            issue_id INTEGER NOT NULL REFERENCES issues(issue_id),
            body TEXT NOT NULL DEFAULT '',
            user_login TEXT NOT NULL DEFAULT '',
            author_association TEXT NOT NULL DEFAULT '',
            created_at TEXT,
            updated_at TEXT
        );

        CREATE TABLE IF NOT EXISTS issue_features (
            issue_id INTEGER PRIMARY KEY REFERENCES issues(issue_id),
            fixability_score REAL NOT NULL,
            grade TEXT NOT NULL,
            reasons TEXT NOT NULL DEFAULT '[]',
            features TEXT NOT NULL DEFAULT '{}',
            computed_at TEXT NOT NULL
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_repos_owner_name ON repos(owner, name);
        CREATE INDEX IF NOT EXISTS idx_issues_repo_number ON issues(repo_id, number);
        CREATE INDEX IF NOT EXISTS idx_issues_updated_at ON issues(updated_at);
        CREATE INDEX IF NOT EXISTS idx_comments_issue_created ON comments(issue_id, created_at);
        ",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('repos', 'issues', 'comments', 'issue_features')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }
}
