//! Story generators.
//!
//! [`HeuristicGenerator`] works offline. [`RemoteGenerator`] asks a text model
//! first and hands over to the heuristic one whenever the model cannot be used.
//! Neither returns an error: every path yields a usable [`StoryDraft`].

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    extract, format_story, generation_messages, parse_story_json, scan_story_sections, suggest,
    tweak_messages, ChatCompletion, OpenAiChatClient,
};
use crate::config::Config;
use crate::models::{StoryDraft, TeamConfig};

pub const TWEAK_NOTE_SUGGESTION: &str = "No OpenAI API key, tweak applied as note.";
pub const TWEAK_FAILED_SUGGESTION: &str = "AI tweak failed, see error log.";

#[async_trait]
pub trait Generator: Send + Sync {
    /// Turn a one-sentence request into a formatted story.
    async fn generate(
        &self,
        input: &str,
        team: &TeamConfig,
        prior_context: Option<&str>,
    ) -> StoryDraft;

    /// Revise an existing story according to free-text instructions.
    async fn tweak(
        &self,
        original: &str,
        instructions: &str,
        team: &TeamConfig,
        prior_context: Option<&str>,
    ) -> StoryDraft;

    fn name(&self) -> &'static str;
}

/// Regex extraction plus template substitution.
#[derive(Debug, Clone, Default)]
pub struct HeuristicGenerator;

impl HeuristicGenerator {
    pub fn draft(&self, input: &str, team: &TeamConfig) -> StoryDraft {
        let e = extract(input);
        StoryDraft {
            formatted_story: format_story(&team.user_story_template, &e.role, &e.action, &e.benefit),
            suggestions: suggest(input, &e.role, &e.action, &e.benefit),
        }
    }
}

#[async_trait]
impl Generator for HeuristicGenerator {
    async fn generate(
        &self,
        input: &str,
        team: &TeamConfig,
        _prior_context: Option<&str>,
    ) -> StoryDraft {
        self.draft(input, team)
    }

    async fn tweak(
        &self,
        original: &str,
        instructions: &str,
        _team: &TeamConfig,
        _prior_context: Option<&str>,
    ) -> StoryDraft {
        StoryDraft {
            formatted_story: format!("{}\n\n(Tweak: {})", original, instructions),
            suggestions: vec![TWEAK_NOTE_SUGGESTION.to_string()],
        }
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Text-model generator with the heuristic generator as its fallback.
pub struct RemoteGenerator {
    client: Arc<dyn ChatCompletion>,
    fallback: HeuristicGenerator,
}

impl RemoteGenerator {
    pub fn new(client: Arc<dyn ChatCompletion>) -> Self {
        Self {
            client,
            fallback: HeuristicGenerator,
        }
    }
}

#[async_trait]
impl Generator for RemoteGenerator {
    async fn generate(
        &self,
        input: &str,
        team: &TeamConfig,
        prior_context: Option<&str>,
    ) -> StoryDraft {
        let messages = generation_messages(input, team, prior_context);
        let text = match self.client.complete(&messages).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Story generation call failed, using heuristics: {}", e);
                return self.fallback.draft(input, team);
            }
        };

        match parse_story_json(&text) {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!("Model reply was not story JSON ({}), scanning sections", e);
                scan_story_sections(&text).unwrap_or_else(|| {
                    tracing::warn!("No story found in model reply, using heuristics");
                    self.fallback.draft(input, team)
                })
            }
        }
    }

    async fn tweak(
        &self,
        original: &str,
        instructions: &str,
        team: &TeamConfig,
        prior_context: Option<&str>,
    ) -> StoryDraft {
        let messages = tweak_messages(original, instructions, team, prior_context);
        match self.client.complete(&messages).await {
            Ok(text) => parse_story_json(&text).unwrap_or_else(|e| {
                tracing::warn!("Tweak reply was not story JSON ({}), using raw text", e);
                StoryDraft {
                    formatted_story: text,
                    suggestions: Vec::new(),
                }
            }),
            Err(e) => {
                tracing::error!("Story tweak call failed: {}", e);
                StoryDraft {
                    formatted_story: format!("{}\n\n(Tweak failed: {})", original, instructions),
                    suggestions: vec![TWEAK_FAILED_SUGGESTION.to_string()],
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// Pick the generator once, based on whether a model credential is configured.
pub fn build_generator(config: &Config) -> Arc<dyn Generator> {
    match &config.openai_api_key {
        Some(key) => {
            let client =
                OpenAiChatClient::new(&config.openai_base_url, &config.openai_model, key);
            Arc::new(RemoteGenerator::new(Arc::new(client)))
        }
        None => Arc::new(HeuristicGenerator),
    }
}
