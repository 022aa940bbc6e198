//! Database module for SQLite persistence.
//!
//! One SQLite file holds every team's stories and tweak history. It replaces a
//! read-modify-write JSON file, so concurrent writers no longer drop records.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Open the records database, falling back to an in-memory store.
///
/// Read-only hosts cannot create the file. Stories are then kept only for the
/// life of the process so that generation keeps working.
pub async fn open_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    match init_database(db_path).await {
        Ok(pool) => Ok(pool),
        Err(e) => {
            tracing::warn!(
                "Cannot open records database {:?}: {}. Using in-memory store.",
                db_path,
                e
            );
            init_memory_database().await
        }
    }
}

/// In-memory database with the same schema.
///
/// Each SQLite memory connection is its own database, so the pool holds a
/// single connection that never expires.
pub async fn init_memory_database() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    // seq keeps insertion order for stories created within the same millisecond
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stories (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            team_id TEXT NOT NULL,
            original_input TEXT NOT NULL,
            formatted_story TEXT NOT NULL,
            suggestions TEXT NOT NULL,
            created_at TEXT NOT NULL,
            team_config_snapshot TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_tweaks (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            story_id TEXT NOT NULL REFERENCES stories(id),
            tweak_instructions TEXT NOT NULL,
            formatted_story TEXT NOT NULL,
            suggestions TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_stories_team_id ON stories(team_id);
        CREATE INDEX IF NOT EXISTS idx_story_tweaks_story_id ON story_tweaks(story_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_unwritable_path_falls_back_to_memory() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let db_path = blocker.join("team-stories.sqlite");

        assert!(init_database(&db_path).await.is_err());

        let repo = Repository::new(open_database(&db_path).await.unwrap());
        assert_eq!(repo.get_revision_id().await.unwrap(), 0);
        assert!(repo.list_team_ids().await.unwrap().is_empty());
    }
}
