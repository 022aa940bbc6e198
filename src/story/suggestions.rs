//! Heuristic improvement hints for a locally formatted story.

use super::DEFAULT_ROLE;

pub const MAX_SUGGESTIONS: usize = 3;

pub const SUGGEST_SPECIFIC_ROLE: &str =
    "Consider being more specific about the user role (e.g., \"customer\", \"admin\", \"developer\")";
pub const SUGGEST_DETAILED_ACTION: &str =
    "Try to be more specific about what functionality you want";
pub const SUGGEST_CLEAR_BENEFIT: &str =
    "Consider explaining the business value or user benefit more clearly";
pub const SUGGEST_BENEFIT_CONNECTOR: &str =
    "Try to include the benefit or reason using words like \"so\", \"because\", or \"to\"";

/// Fields shorter than this many characters are flagged as vague.
const MIN_DETAIL_CHARS: usize = 10;

/// Suggest up to three improvements, always in rule order.
pub fn suggest(input: &str, role: &str, action: &str, benefit: &str) -> Vec<String> {
    let checks = [
        (role == DEFAULT_ROLE, SUGGEST_SPECIFIC_ROLE),
        (action.chars().count() < MIN_DETAIL_CHARS, SUGGEST_DETAILED_ACTION),
        (benefit.chars().count() < MIN_DETAIL_CHARS, SUGGEST_CLEAR_BENEFIT),
        (
            !["so", "because", "to"].iter().any(|w| input.contains(w)),
            SUGGEST_BENEFIT_CONNECTOR,
        ),
    ];

    checks
        .into_iter()
        .filter(|(fired, _)| *fired)
        .map(|(_, text)| text.to_string())
        .take(MAX_SUGGESTIONS)
        .collect()
}
