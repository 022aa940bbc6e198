//! Story repository.
//!
//! Every write runs in a transaction and bumps the store revision once.

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::models::{NewStory, NewTweak, StoryRecord, TeamConfig, TweakRecord};

const STORY_COLUMNS: &str = "id, team_id, original_input, formatted_story, suggestions, created_at, team_config_snapshot, version";
const TWEAK_COLUMNS: &str = "id, story_id, tweak_instructions, formatted_story, suggestions, created_at";

/// Database repository for story records and their tweak history.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Persist a freshly generated story with an empty tweak history.
    pub async fn save_new_story(&self, story: &NewStory) -> Result<StoryRecord, AppError> {
        let id = generate_id();
        let now = timestamp();
        let suggestions_json = serde_json::to_string(&story.suggestions)?;
        let snapshot_json = serde_json::to_string(&story.team_config)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO stories (id, team_id, original_input, formatted_story, suggestions, created_at, team_config_snapshot, version) VALUES (?, ?, ?, ?, ?, ?, ?, 1)"
        )
        .bind(&id)
        .bind(&story.team_id)
        .bind(&story.original_input)
        .bind(&story.formatted_story)
        .bind(&suggestions_json)
        .bind(&now)
        .bind(&snapshot_json)
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        Ok(StoryRecord {
            id,
            team_id: story.team_id.clone(),
            original_input: story.original_input.clone(),
            formatted_story: story.formatted_story.clone(),
            suggestions: story.suggestions.clone(),
            created_at: now,
            team_config_snapshot: story.team_config.clone(),
            tweak_history: Vec::new(),
            version: 1,
        })
    }

    /// Record a tweak and make its output the story's current version.
    ///
    /// Returns `Ok(None)` without writing anything when the story does not exist.
    pub async fn add_tweak_to_story(
        &self,
        tweak: &NewTweak,
    ) -> Result<Option<StoryRecord>, AppError> {
        let suggestions_json = serde_json::to_string(&tweak.suggestions)?;

        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before any read
        let result = sqlx::query(
            "UPDATE stories SET formatted_story = ?, suggestions = ?, version = version + 1 WHERE id = ? AND (? IS NULL OR version = ?)"
        )
        .bind(&tweak.formatted_story)
        .bind(&suggestions_json)
        .bind(&tweak.story_id)
        .bind(tweak.expected_version)
        .bind(tweak.expected_version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let current = sqlx::query("SELECT version FROM stories WHERE id = ?")
                .bind(&tweak.story_id)
                .fetch_optional(&self.pool)
                .await?;
            return match current {
                None => Ok(None),
                Some(row) => {
                    let current_version: i64 = row.get("version");
                    Err(AppError::Conflict {
                        message: format!(
                            "Version mismatch: expected {}, current {}",
                            tweak.expected_version.unwrap_or_default(),
                            current_version
                        ),
                        current_version,
                    })
                }
            };
        }

        sqlx::query(
            "INSERT INTO story_tweaks (id, story_id, tweak_instructions, formatted_story, suggestions, created_at) VALUES (?, ?, ?, ?, ?, ?)"
        )
        .bind(generate_id())
        .bind(&tweak.story_id)
        .bind(&tweak.tweak_instructions)
        .bind(&tweak.formatted_story)
        .bind(&suggestions_json)
        .bind(timestamp())
        .execute(&mut *tx)
        .await?;

        bump_revision(&mut tx).await?;
        tx.commit().await?;

        self.get_story(&tweak.story_id).await
    }

    /// Get a story by ID, tweak history newest first.
    pub async fn get_story(&self, id: &str) -> Result<Option<StoryRecord>, AppError> {
        let sql = format!("SELECT {} FROM stories WHERE id = ?", STORY_COLUMNS);
        let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM story_tweaks WHERE story_id = ? ORDER BY seq DESC",
            TWEAK_COLUMNS
        );
        let tweaks = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(tweak_from_row)
            .collect();

        Ok(Some(story_from_row(&row, tweaks)))
    }

    /// All stories for a team, oldest first.
    pub async fn get_stories_for_team(&self, team_id: &str) -> Result<Vec<StoryRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM stories WHERE team_id = ? ORDER BY seq ASC",
            STORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_tweaks(team_id, &rows).await
    }

    /// The `limit` most recent stories for a team, newest first.
    pub async fn get_recent_stories_for_team(
        &self,
        team_id: &str,
        limit: i64,
    ) -> Result<Vec<StoryRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM stories WHERE team_id = ? ORDER BY seq DESC LIMIT ?",
            STORY_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(team_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        self.attach_tweaks(team_id, &rows).await
    }

    /// Every team that has at least one story.
    pub async fn list_team_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT DISTINCT team_id FROM stories ORDER BY team_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("team_id")).collect())
    }

    async fn attach_tweaks(
        &self,
        team_id: &str,
        rows: &[sqlx::sqlite::SqliteRow],
    ) -> Result<Vec<StoryRecord>, AppError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM story_tweaks WHERE story_id IN (SELECT id FROM stories WHERE team_id = ?) ORDER BY seq DESC",
            TWEAK_COLUMNS
        );
        let tweak_rows = sqlx::query(&sql)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;

        let mut by_story: HashMap<String, Vec<TweakRecord>> = HashMap::new();
        for row in &tweak_rows {
            let story_id: String = row.get("story_id");
            by_story.entry(story_id).or_default().push(tweak_from_row(row));
        }

        Ok(rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let tweaks = by_story.remove(&id).unwrap_or_default();
                story_from_row(row, tweaks)
            })
            .collect())
    }
}

async fn bump_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<(), AppError> {
    sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
        .bind(timestamp())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Millisecond timestamp plus a random suffix. Unique in practice, not guaranteed.
pub fn generate_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..12])
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Helper functions for row conversion

fn story_from_row(row: &sqlx::sqlite::SqliteRow, tweak_history: Vec<TweakRecord>) -> StoryRecord {
    let suggestions_str: String = row.get("suggestions");
    let snapshot_str: String = row.get("team_config_snapshot");
    StoryRecord {
        id: row.get("id"),
        team_id: row.get("team_id"),
        original_input: row.get("original_input"),
        formatted_story: row.get("formatted_story"),
        suggestions: parse_json_array(&suggestions_str),
        created_at: row.get("created_at"),
        team_config_snapshot: serde_json::from_str::<TeamConfig>(&snapshot_str).unwrap_or_default(),
        tweak_history,
        version: row.get("version"),
    }
}

fn tweak_from_row(row: &sqlx::sqlite::SqliteRow) -> TweakRecord {
    let suggestions_str: String = row.get("suggestions");
    TweakRecord {
        id: row.get("id"),
        tweak_instructions: row.get("tweak_instructions"),
        formatted_story: row.get("formatted_story"),
        suggestions: parse_json_array(&suggestions_str),
        created_at: row.get("created_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("stories.sqlite"))
            .await
            .expect("Failed to init DB");
        (Repository::new(pool), temp_dir)
    }

    fn new_story(team_id: &str, input: &str) -> NewStory {
        NewStory {
            team_id: team_id.to_string(),
            original_input: input.to_string(),
            formatted_story: format!("Story for {}", input),
            suggestions: vec!["be specific".to_string()],
            team_config: TeamConfig {
                id: team_id.to_string(),
                team_name: "Team".to_string(),
                ..Default::default()
            },
        }
    }

    fn new_tweak(story_id: &str, text: &str) -> NewTweak {
        NewTweak {
            story_id: story_id.to_string(),
            tweak_instructions: format!("make it {}", text),
            formatted_story: text.to_string(),
            suggestions: Vec::new(),
            expected_version: None,
        }
    }

    #[tokio::test]
    async fn test_save_and_get_story() {
        let (repo, _dir) = repo().await;
        let saved = repo.save_new_story(&new_story("t1", "login")).await.unwrap();
        assert!(saved.tweak_history.is_empty());
        assert_eq!(saved.version, 1);

        let loaded = repo.get_story(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.formatted_story, "Story for login");
        assert_eq!(loaded.suggestions, vec!["be specific".to_string()]);
        assert_eq!(loaded.team_config_snapshot.team_name, "Team");
        assert_eq!(loaded.created_at, saved.created_at);
    }

    #[tokio::test]
    async fn test_tweaks_update_current_and_prepend_history() {
        let (repo, _dir) = repo().await;
        let saved = repo.save_new_story(&new_story("t1", "login")).await.unwrap();

        repo.add_tweak_to_story(&new_tweak(&saved.id, "shorter"))
            .await
            .unwrap()
            .unwrap();
        let updated = repo
            .add_tweak_to_story(&new_tweak(&saved.id, "clearer"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.formatted_story, "clearer");
        assert_eq!(updated.tweak_history.len(), 2);
        assert_eq!(updated.tweak_history[0].formatted_story, "clearer");
        assert_eq!(updated.tweak_history[1].formatted_story, "shorter");
        assert_eq!(updated.version, 3);
        assert_eq!(updated.original_input, "login");
    }

    #[tokio::test]
    async fn test_tweak_unknown_story_writes_nothing() {
        let (repo, _dir) = repo().await;
        let saved = repo.save_new_story(&new_story("t1", "login")).await.unwrap();
        let revision_before = repo.get_revision_id().await.unwrap();

        let result = repo
            .add_tweak_to_story(&new_tweak("missing-id", "x"))
            .await
            .unwrap();
        assert!(result.is_none());

        assert_eq!(repo.get_revision_id().await.unwrap(), revision_before);
        let stories = repo.get_stories_for_team("t1").await.unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, saved.id);
        assert_eq!(stories[0].formatted_story, "Story for login");
        assert!(stories[0].tweak_history.is_empty());
    }

    #[tokio::test]
    async fn test_tweak_version_conflict() {
        let (repo, _dir) = repo().await;
        let saved = repo.save_new_story(&new_story("t1", "login")).await.unwrap();

        let mut tweak = new_tweak(&saved.id, "x");
        tweak.expected_version = Some(7);
        let err = repo.add_tweak_to_story(&tweak).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Conflict {
                current_version: 1,
                ..
            }
        ));

        tweak.expected_version = Some(1);
        let updated = repo.add_tweak_to_story(&tweak).await.unwrap().unwrap();
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_team_listing_order_and_isolation() {
        let (repo, _dir) = repo().await;
        let first = repo.save_new_story(&new_story("t1", "one")).await.unwrap();
        repo.save_new_story(&new_story("t2", "other")).await.unwrap();
        let second = repo.save_new_story(&new_story("t1", "two")).await.unwrap();
        let third = repo.save_new_story(&new_story("t1", "three")).await.unwrap();

        let all = repo.get_stories_for_team("t1").await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![first.id.clone(), second.id.clone(), third.id.clone()]);

        let recent = repo.get_recent_stories_for_team("t1", 2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![third.id, second.id]);

        assert!(repo.get_stories_for_team("nobody").await.unwrap().is_empty());
        assert_eq!(
            repo.list_team_ids().await.unwrap(),
            vec!["t1".to_string(), "t2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_concurrent_saves_keep_both_records() {
        let (repo, _dir) = repo().await;
        let revision_before = repo.get_revision_id().await.unwrap();

        let a = new_story("team-a", "alpha");
        let b = new_story("team-b", "beta");
        let (ra, rb) = tokio::join!(repo.save_new_story(&a), repo.save_new_story(&b));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        let team_a = repo.get_stories_for_team("team-a").await.unwrap();
        let team_b = repo.get_stories_for_team("team-b").await.unwrap();
        assert_eq!(team_a.len(), 1);
        assert_eq!(team_b.len(), 1);
        assert_eq!(team_a[0].id, ra.id);
        assert_eq!(team_b[0].id, rb.id);
        assert_eq!(repo.get_revision_id().await.unwrap(), revision_before + 2);
    }

    #[tokio::test]
    async fn test_many_concurrent_saves_from_spawned_tasks() {
        let (repo, _dir) = repo().await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    let team = if i % 2 == 0 { "even" } else { "odd" };
                    let story = new_story(team, &format!("input {}", i));
                    let saved = repo.save_new_story(&story).await;
                    saved
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.get_stories_for_team("even").await.unwrap().len(), 4);
        assert_eq!(repo.get_stories_for_team("odd").await.unwrap().len(), 4);
    }

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        let (millis, suffix) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 12);
        assert_ne!(generate_id(), id);
    }
}
