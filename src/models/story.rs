//! Story models: persisted records, tweak history and request/response bodies.

use serde::{Deserialize, Serialize};

use super::TeamConfig;

/// A generated story plus every refinement applied to it.
///
/// `formatted_story` and `suggestions` always hold the latest version; the
/// history keeps each tweak's output, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: String,
    pub team_id: String,
    pub original_input: String,
    pub formatted_story: String,
    pub suggestions: Vec<String>,
    pub created_at: String,
    pub team_config_snapshot: TeamConfig,
    pub tweak_history: Vec<TweakRecord>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// One refinement of a story. Never modified after it is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweakRecord {
    pub id: String,
    pub tweak_instructions: String,
    pub formatted_story: String,
    pub suggestions: Vec<String>,
    pub created_at: String,
}

/// Output of a generator: the story text and up to three hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDraft {
    pub formatted_story: String,
    pub suggestions: Vec<String>,
}

/// Input for persisting a freshly generated story.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub team_id: String,
    pub original_input: String,
    pub formatted_story: String,
    pub suggestions: Vec<String>,
    pub team_config: TeamConfig,
}

/// Input for appending a tweak to an existing story.
#[derive(Debug, Clone)]
pub struct NewTweak {
    pub story_id: String,
    pub tweak_instructions: String,
    pub formatted_story: String,
    pub suggestions: Vec<String>,
    /// Expected version for optimistic concurrency control
    pub expected_version: Option<i64>,
}

/// Request body for generating a story.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStoryRequest {
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_config: Option<TeamConfig>,
}

/// Request body for tweaking a story.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweakStoryRequest {
    #[serde(default)]
    pub original_story: Option<String>,
    #[serde(default)]
    pub tweak_instructions: Option<String>,
    #[serde(default)]
    pub team_config: Option<TeamConfig>,
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Response body for generate and tweak requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResponse {
    pub formatted_story: String,
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
}

/// Response body for the team context endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamContextResponse {
    pub context_text: String,
}
