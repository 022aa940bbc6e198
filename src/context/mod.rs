//! Per-team context digests.
//!
//! A digest is a plain-text summary of every story a team has written. It is a
//! cache: the records in the database are authoritative and any digest can be
//! deleted and rebuilt from them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::StoryRecord;

pub const EMPTY_DIGEST: &str = "No prior stories for this team.";

/// Render the digest text for a team's stories, oldest first.
pub fn render_digest(stories: &[StoryRecord]) -> String {
    if stories.is_empty() {
        return EMPTY_DIGEST.to_string();
    }

    let mut lines = vec![format!("Team Stories Count: {}", stories.len()), String::new()];

    for (idx, story) in stories.iter().enumerate() {
        lines.push(format!("Story #{} (Created: {})", idx + 1, story.created_at));
        lines.push(format!("Original Input: {}", story.original_input));
        lines.push(format!("User Story: {}", story.formatted_story));
        if !story.suggestions.is_empty() {
            lines.push("Suggestions:".to_string());
            lines.extend(story.suggestions.iter().map(|s| format!("- {}", s)));
        }
        if !story.tweak_history.is_empty() {
            lines.push(format!("Edits ({}):", story.tweak_history.len()));
            for (t_idx, tweak) in story.tweak_history.iter().enumerate() {
                lines.push(format!("  Edit #{} at {}", t_idx + 1, tweak.created_at));
                lines.push(format!("  Request: {}", tweak.tweak_instructions));
                lines.push(format!("  Updated Story: {}", tweak.formatted_story));
                if !tweak.suggestions.is_empty() {
                    lines.push("  Suggestions:".to_string());
                    lines.extend(tweak.suggestions.iter().map(|s| format!("  - {}", s)));
                }
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Directory of `<teamId>-context.txt` digest files.
///
/// Rebuilds of the same team are serialized so the file always ends up with
/// the render of the latest records.
#[derive(Debug, Clone)]
pub struct ContextDigests {
    dir: PathBuf,
    team_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ContextDigests {
    /// Use `dir` for digests, creating it if possible.
    ///
    /// A directory that cannot be created is only logged: digests are then
    /// still rendered, just never written.
    pub fn open(dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::warn!("Failed to create digest directory {:?}: {}", dir, e);
        }
        Self {
            dir: dir.to_path_buf(),
            team_locks: Arc::default(),
        }
    }

    /// File path for a team's digest.
    ///
    /// Bytes outside `[A-Za-z0-9-]` are written as `_XX` hex escapes, so
    /// distinct team ids never share a file.
    pub fn path_for(&self, team_id: &str) -> PathBuf {
        self.dir.join(format!("{}-context.txt", encode_team_id(team_id)))
    }

    fn team_lock(&self, team_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .team_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(team_id.to_string()).or_default().clone()
    }

    /// Last written digest for a team, if any.
    pub async fn read(&self, team_id: &str) -> Option<String> {
        tokio::fs::read_to_string(self.path_for(team_id)).await.ok()
    }

    /// Regenerate a team's digest from its records and write it out.
    ///
    /// Write failures are logged; the freshly rendered text is returned either way.
    pub async fn rebuild(&self, repo: &Repository, team_id: &str) -> Result<String, AppError> {
        let lock = self.team_lock(team_id);
        let _guard = lock.lock().await;

        let stories = repo.get_stories_for_team(team_id).await?;
        let text = render_digest(&stories);

        let path = self.path_for(team_id);
        if let Err(e) = self.write(&path, &text).await {
            tracing::warn!("Failed to write context digest {:?}: {}", path, e);
        }
        Ok(text)
    }

    /// Rebuild the digest of every team that has stories.
    pub async fn rebuild_all(&self, repo: &Repository) -> Result<usize, AppError> {
        let team_ids = repo.list_team_ids().await?;
        for team_id in &team_ids {
            self.rebuild(repo, team_id).await?;
        }
        Ok(team_ids.len())
    }

    async fn write(&self, path: &Path, text: &str) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}

fn encode_team_id(team_id: &str) -> String {
    let mut encoded = String::with_capacity(team_id.len());
    for byte in team_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}
