//! Team configuration model matching the client's TeamConfig payload.

use serde::{Deserialize, Serialize};

/// Placeholder replaced by the extracted role.
pub const ROLE_TOKEN: &str = "[role]";
/// Placeholder replaced by the extracted feature or functionality.
pub const FEATURE_TOKEN: &str = "[feature/functionality]";
/// Placeholder replaced by the extracted benefit or value.
pub const BENEFIT_TOKEN: &str = "[benefit/value]";

/// A team's story settings. Created by the client and never changed server-side.
///
/// The template is expected to carry [`ROLE_TOKEN`], [`FEATURE_TOKEN`] and
/// [`BENEFIT_TOKEN`]; nothing enforces it, a missing token just drops that field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub mission: String,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub user_story_template: String,
    #[serde(default)]
    pub team_roles: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TeamConfig {
    /// The configured id, if the client sent a non-empty one.
    pub fn team_id(&self) -> Option<&str> {
        let id = self.id.trim();
        (!id.is_empty()).then_some(id)
    }
}
