//! Chat-completions client and response parsing for remote story generation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::{StoryDraft, TeamConfig};

use super::MAX_SUGGESTIONS;

/// Sampling temperature sent with every completion request.
pub const TEMPERATURE: f32 = 0.7;
/// Output length cap sent with every completion request.
pub const MAX_TOKENS: u32 = 500;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("no API credential configured")]
    MissingCredential,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no content")]
    EmptyResponse,
    #[error("could not decode model payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Anything that can turn a system/user message pair into raw response text.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RemoteError>;
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Clone, Debug)]
pub struct OpenAiChatClient {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

impl OpenAiChatClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    #[cfg(test)]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RemoteError> {
        if self.api_key.is_empty() {
            return Err(RemoteError::MissingCredential);
        }

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        if content.is_empty() {
            return Err(RemoteError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Shape the model is asked to answer with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryPayload {
    #[serde(default)]
    formatted_story: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
}

fn team_context_block(team: &TeamConfig) -> String {
    format!(
        "Team Context:\n- Team Name: {}\n- Mission: {}\n- Project: {}\n- Team Roles: {}\n\nUser Story Template: {}",
        team.team_name,
        team.mission,
        team.project_description,
        team.team_roles,
        team.user_story_template
    )
}

fn prior_stories_block(prior_context: Option<&str>) -> String {
    match prior_context {
        Some(ctx) if !ctx.trim().is_empty() => {
            format!("\n\nStories this team wrote recently:\n{}", ctx.trim_end())
        }
        _ => String::new(),
    }
}

const JSON_REPLY_SHAPE: &str = "Answer with JSON only:\n{\n  \"formattedStory\": \"the user story\",\n  \"suggestions\": [\"suggestion 1\", \"suggestion 2\"]\n}";

/// Messages asking the model to turn a one-sentence request into a story.
pub fn generation_messages(
    input: &str,
    team: &TeamConfig,
    prior_context: Option<&str>,
) -> Vec<ChatMessage> {
    let system = format!(
        "You write agile user stories for a SAFe team.\n\n{}{}\n\nSteps:\n1. Identify the role, the feature or functionality, and the benefit or value in the request.\n2. Write the story using the template above.\n3. Offer one or two ways to improve it, if any.\n\n{}",
        team_context_block(team),
        prior_stories_block(prior_context),
        JSON_REPLY_SHAPE
    );
    let user = format!(
        "User Input: \"{}\"\n\nWrite a user story for this request.",
        input
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Messages asking the model to revise an existing story.
pub fn tweak_messages(
    original: &str,
    instructions: &str,
    team: &TeamConfig,
    prior_context: Option<&str>,
) -> Vec<ChatMessage> {
    let system = format!(
        "You refine agile user stories for a SAFe team.\n\n{}{}\n\nSteps:\n1. Read the story and the requested change.\n2. Rewrite the story accordingly, keeping it clear and well structured.\n3. Offer one or two further improvements, if any.\n\n{}",
        team_context_block(team),
        prior_stories_block(prior_context),
        JSON_REPLY_SHAPE
    );
    let user = format!(
        "Original Story: \"{}\"\n\nTweak Instructions: {}\n\nRevise the story as requested.",
        original, instructions
    );
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Parse a JSON reply, tolerating a surrounding code fence.
///
/// A payload without a non-empty `formattedStory` is treated as unparseable.
pub fn parse_story_json(text: &str) -> Result<StoryDraft, RemoteError> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let payload: StoryPayload =
        serde_json::from_str(trimmed).map_err(|e| RemoteError::Decode(e.to_string()))?;

    let formatted_story = payload
        .formatted_story
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RemoteError::Decode("missing formattedStory".to_string()))?;

    let mut suggestions = payload.suggestions.unwrap_or_default();
    suggestions.truncate(MAX_SUGGESTIONS);

    Ok(StoryDraft {
        formatted_story,
        suggestions,
    })
}

#[derive(PartialEq)]
enum Section {
    None,
    Story,
    Suggestions,
}

/// Recover a story from free-form text by scanning for headed sections.
///
/// A line mentioning "user story" or "story:" opens the story section, a line
/// mentioning "suggestion" opens the suggestions section. The last non-empty
/// line under a story heading becomes the story.
pub fn scan_story_sections(text: &str) -> Option<StoryDraft> {
    let mut section = Section::None;
    let mut story = String::new();
    let mut suggestions = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        if lower.contains("user story") || lower.contains("story:") {
            section = Section::Story;
        } else if lower.contains("suggestion") {
            section = Section::Suggestions;
        } else if trimmed.is_empty() {
            continue;
        } else if section == Section::Story {
            story = trimmed.to_string();
        } else if section == Section::Suggestions {
            suggestions.push(trimmed.to_string());
        }
    }

    if story.is_empty() {
        return None;
    }
    suggestions.truncate(MAX_SUGGESTIONS);
    Some(StoryDraft {
        formatted_story: story,
        suggestions,
    })
}
