//! Story generation, tweak and lookup endpoints.
//!
//! Generation never fails once the request is valid: storage problems are
//! logged and the story is still returned, only without a `storyId`.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{error, non_blank, success, ApiResult};
use crate::context::render_digest;
use crate::errors::AppError;
use crate::models::{
    GenerateStoryRequest, NewStory, NewTweak, StoryRecord, StoryResponse, TweakStoryRequest,
};
use crate::AppState;

/// Prompt context built from a team's most recent stories, oldest first.
async fn prior_context(state: &AppState, team_id: Option<&str>) -> Option<String> {
    let team_id = team_id?;
    match state
        .repo
        .get_recent_stories_for_team(team_id, state.config.context_story_limit)
        .await
    {
        Ok(mut stories) if !stories.is_empty() => {
            stories.reverse();
            Some(render_digest(&stories))
        }
        Ok(_) => None,
        Err(e) => {
            tracing::warn!("Failed to load prior stories for team {}: {}", team_id, e);
            None
        }
    }
}

/// Re-render a team's digest after a write.
async fn refresh_digest(state: &AppState, team_id: &str) {
    if let Err(e) = state.digests.rebuild(&state.repo, team_id).await {
        tracing::warn!("Failed to rebuild context digest for team {}: {}", team_id, e);
    }
}

/// POST /api/generate-story - Generate a story from a one-sentence request.
pub async fn generate_story(
    State(state): State<AppState>,
    Json(request): Json<GenerateStoryRequest>,
) -> ApiResult<StoryResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let (Some(user_input), Some(team_config)) = (
        non_blank(request.user_input.as_deref()),
        request.team_config.as_ref(),
    ) else {
        return error(
            AppError::Validation("Missing required fields: userInput and teamConfig".to_string()),
            revision_id,
        );
    };

    let team_id = non_blank(request.team_id.as_deref()).or_else(|| team_config.team_id());
    let context = prior_context(&state, team_id).await;

    let draft = state
        .generator
        .generate(user_input, team_config, context.as_deref())
        .await;
    tracing::debug!("Generated story with {} generator", state.generator.name());

    let mut story_id = None;
    if let Some(team_id) = team_id {
        let new_story = NewStory {
            team_id: team_id.to_string(),
            original_input: user_input.to_string(),
            formatted_story: draft.formatted_story.clone(),
            suggestions: draft.suggestions.clone(),
            team_config: team_config.clone(),
        };
        match state.repo.save_new_story(&new_story).await {
            Ok(record) => {
                refresh_digest(&state, team_id).await;
                story_id = Some(record.id);
            }
            Err(e) => tracing::warn!("Story not persisted for team {}: {}", team_id, e),
        }
    }

    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    success(
        StoryResponse {
            formatted_story: draft.formatted_story,
            suggestions: draft.suggestions,
            story_id,
        },
        new_revision,
    )
}

/// PATCH /api/generate-story - Revise a story and record the tweak.
pub async fn tweak_story(
    State(state): State<AppState>,
    Json(request): Json<TweakStoryRequest>,
) -> ApiResult<StoryResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let (Some(original_story), Some(instructions), Some(team_config)) = (
        non_blank(request.original_story.as_deref()),
        non_blank(request.tweak_instructions.as_deref()),
        request.team_config.as_ref(),
    ) else {
        return error(
            AppError::Validation(
                "Missing required fields: originalStory, tweakInstructions and teamConfig"
                    .to_string(),
            ),
            revision_id,
        );
    };

    let team_id = non_blank(request.team_id.as_deref()).or_else(|| team_config.team_id());
    let context = prior_context(&state, team_id).await;

    let draft = state
        .generator
        .tweak(original_story, instructions, team_config, context.as_deref())
        .await;

    let mut story_id = None;
    if let Some(id) = non_blank(request.story_id.as_deref()) {
        let tweak = NewTweak {
            story_id: id.to_string(),
            tweak_instructions: instructions.to_string(),
            formatted_story: draft.formatted_story.clone(),
            suggestions: draft.suggestions.clone(),
            expected_version: request.expected_version,
        };
        match state.repo.add_tweak_to_story(&tweak).await {
            Ok(Some(record)) => {
                refresh_digest(&state, &record.team_id).await;
                story_id = Some(record.id);
            }
            Ok(None) => tracing::warn!("Tweak not recorded: story {} not found", id),
            Err(e @ AppError::Conflict { .. }) => return error(e, revision_id),
            Err(e) => tracing::warn!("Tweak not recorded for story {}: {}", id, e),
        }
    }

    let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
    success(
        StoryResponse {
            formatted_story: draft.formatted_story,
            suggestions: draft.suggestions,
            story_id,
        },
        new_revision,
    )
}

/// GET /api/stories/{id} - Get a single story with its tweak history.
pub async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StoryRecord> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_story(&id).await {
        Ok(Some(story)) => success(story, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Story {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/teams/{team_id}/stories - List a team's stories, oldest first.
pub async fn list_team_stories(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> ApiResult<Vec<StoryRecord>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_stories_for_team(&team_id).await {
        Ok(stories) => success(stories, revision_id),
        Err(e) => error(e, revision_id),
    }
}
