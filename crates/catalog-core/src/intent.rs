//! Query intent heuristics used to route lexical column weights.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryIntent {
    /// Topical, natural-language question; favour body matches.
    Informational,
    /// Exact title, path or identifier lookup; favour heading matches.
    Navigational,
}

impl QueryIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Informational => "informational",
            Self::Navigational => "navigational",
        }
    }
}

impl fmt::Display for QueryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const FILE_EXTENSIONS: &[&str] = &[".md", ".py", ".txt", ".json", ".yaml", ".yml", ".toml"];
const MAX_IDENTIFIER_TOKENS: usize = 3;

/// Classify a raw query. Pure and total: every input maps to an intent.
#[must_use]
pub fn classify_intent(query: &str) -> QueryIntent {
    let q = query.trim();
    if q.is_empty() {
        return QueryIntent::Informational;
    }
    if is_fully_quoted(q) {
        return QueryIntent::Navigational;
    }
    if is_path_like(q) {
        return QueryIntent::Navigational;
    }
    let tokens: Vec<&str> = q.split_whitespace().collect();
    if tokens.len() <= MAX_IDENTIFIER_TOKENS && tokens.iter().any(|t| is_identifier_token(t)) {
        return QueryIntent::Navigational;
    }
    QueryIntent::Informational
}

fn is_fully_quoted(q: &str) -> bool {
    ['"', '\''].iter().any(|&quote| {
        q.len() >= 2 && q.starts_with(quote) && q.ends_with(quote) && !q.contains('\n')
    })
}

fn is_path_like(q: &str) -> bool {
    if q.contains('/') || q.contains('\\') {
        return true;
    }
    let lower = q.to_lowercase();
    FILE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn is_identifier_token(token: &str) -> bool {
    if is_issue_key(token) || has_camel_boundary(token) {
        return true;
    }
    token.chars().count() >= 2
        && token.chars().any(char::is_alphabetic)
        && token == token.to_uppercase()
}

/// `PROJ-123` style keys: ASCII uppercase letters, a dash, then digits.
fn is_issue_key(token: &str) -> bool {
    token.split_once('-').is_some_and(|(key, num)| {
        !key.is_empty()
            && !num.is_empty()
            && key.chars().all(|c| c.is_ascii_uppercase())
            && num.chars().all(|c| c.is_ascii_digit())
    })
}

/// A lowercase letter immediately followed by an uppercase one.
fn has_camel_boundary(token: &str) -> bool {
    let chars: Vec<char> = token.chars().collect();
    chars.windows(2).any(|w| w[0].is_ascii_lowercase() && w[1].is_ascii_uppercase())
}
