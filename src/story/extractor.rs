//! Pattern-based extraction of role, action and benefit from free text.
//!
//! Each field has an ordered rule list. The first rule that matches anywhere in
//! the input wins, regardless of where its match sits in the text.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DEFAULT_ROLE: &str = "user";
pub const DEFAULT_ACTION: &str = "access a feature";
pub const DEFAULT_BENEFIT: &str = "achieve my goals";

/// Role, action and benefit pulled out of a one-sentence request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub role: String,
    pub action: String,
    pub benefit: String,
}

/// A single named pattern whose first capture group is the extracted value.
#[derive(Debug)]
pub struct ExtractionRule {
    pub name: &'static str,
    regex: Regex,
}

impl ExtractionRule {
    fn new(name: &'static str, pattern: &str) -> Self {
        // Patterns are compile-time literals covered by the tests below.
        let regex = Regex::new(&format!("(?i){}", pattern))
            .unwrap_or_else(|e| panic!("invalid extraction pattern {}: {}", name, e));
        Self { name, regex }
    }

    /// Trimmed capture, or `None` when the rule does not match or captures only whitespace.
    pub fn apply(&self, input: &str) -> Option<String> {
        let captured = self.regex.captures(input)?.get(1)?.as_str().trim();
        (!captured.is_empty()).then(|| captured.to_string())
    }
}

/// An ordered rule list with the value used when nothing matches.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<ExtractionRule>,
    default: &'static str,
}

impl RuleSet {
    /// First matching rule in priority order, with its captured value.
    pub fn first_match(&self, input: &str) -> Option<(&'static str, String)> {
        self.rules
            .iter()
            .find_map(|rule| rule.apply(input).map(|value| (rule.name, value)))
    }

    pub fn extract(&self, input: &str) -> String {
        self.first_match(input)
            .map(|(_, value)| value)
            .unwrap_or_else(|| self.default.to_string())
    }

    #[cfg(test)]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}

/// Captures stop at the next sentence terminator.
const CLAUSE: &str = r"([^.!?]+)";

pub static ROLE_RULES: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    rules: vec![
        ExtractionRule::new("as-a-or-an", r"as\s+an?\s+(\w+)"),
        ExtractionRule::new("as-a", r"as\s+a\s+(\w+)"),
        ExtractionRule::new("i-am-a", r"i\s+am\s+a\s+(\w+)"),
        ExtractionRule::new("word-here", r"(\w+)\s+here"),
    ],
    default: DEFAULT_ROLE,
});

pub static ACTION_RULES: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    rules: vec![
        ExtractionRule::new("want-to", &format!(r"want\s+to\s+{}", CLAUSE)),
        ExtractionRule::new("need-to", &format!(r"need\s+to\s+{}", CLAUSE)),
        ExtractionRule::new("would-like-to", &format!(r"would\s+like\s+to\s+{}", CLAUSE)),
        ExtractionRule::new("can", &format!(r"can\s+{}", CLAUSE)),
    ],
    default: DEFAULT_ACTION,
});

pub static BENEFIT_RULES: Lazy<RuleSet> = Lazy::new(|| RuleSet {
    rules: vec![
        ExtractionRule::new("so-that", &format!(r"so\s+(?:that\s+)?{}", CLAUSE)),
        ExtractionRule::new("because", &format!(r"because\s+{}", CLAUSE)),
        ExtractionRule::new("in-order-to", &format!(r"in\s+order\s+to\s+{}", CLAUSE)),
        ExtractionRule::new("to", &format!(r"to\s+{}", CLAUSE)),
    ],
    default: DEFAULT_BENEFIT,
});

/// Extract role, action and benefit, falling back to the defaults per field.
pub fn extract(input: &str) -> Extraction {
    Extraction {
        role: ROLE_RULES.extract(input),
        action: ACTION_RULES.extract(input),
        benefit: BENEFIT_RULES.extract(input),
    }
}
