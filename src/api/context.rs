//! Team context endpoint.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::{error, non_blank, success, ApiResult};
use crate::errors::AppError;
use crate::models::TeamContextResponse;
use crate::AppState;

/// Team context query parameters.
#[derive(Debug, Deserialize)]
pub struct TeamContextQuery {
    /// Team identifier.
    #[serde(default)]
    pub team: Option<String>,
}

/// GET /api/team-context?team=ID - Get a team's digest, rebuilt on demand.
pub async fn get_team_context(
    State(state): State<AppState>,
    Query(query): Query<TeamContextQuery>,
) -> ApiResult<TeamContextResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(team_id) = non_blank(query.team.as_deref()) else {
        return error(
            AppError::Validation("Missing team parameter".to_string()),
            revision_id,
        );
    };

    match state.digests.rebuild(&state.repo, team_id).await {
        Ok(context_text) => success(TeamContextResponse { context_text }, revision_id),
        Err(e) => {
            // Serve the last digest written if the records cannot be read
            match state.digests.read(team_id).await {
                Some(context_text) => {
                    tracing::warn!("Serving cached digest for team {}: {}", team_id, e);
                    success(TeamContextResponse { context_text }, revision_id)
                }
                None => error(e, revision_id),
            }
        }
    }
}
