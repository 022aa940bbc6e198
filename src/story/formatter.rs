//! Template substitution.

use crate::models::{BENEFIT_TOKEN, FEATURE_TOKEN, ROLE_TOKEN};

/// Fill the three placeholders of a story template.
///
/// Only the first occurrence of each token is replaced, tokens are processed in
/// role, feature, benefit order and values are inserted verbatim.
pub fn format_story(template: &str, role: &str, action: &str, benefit: &str) -> String {
    template
        .replacen(ROLE_TOKEN, role, 1)
        .replacen(FEATURE_TOKEN, action, 1)
        .replacen(BENEFIT_TOKEN, benefit, 1)
}
