//! Query keyword extraction and expansion.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z0-9\-']+\b").unwrap_or_else(|err| panic!("invalid TOKEN_RE regex: {err}"))
});

/// Function words dropped from queries before matching.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is",
    "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did", "will",
    "would", "should", "could", "may", "might", "must", "can", "this", "that", "these", "those",
    "what", "which", "who", "whom", "whose", "where", "when", "why", "how",
];

/// Tokens this short carry too little signal to match on.
const MIN_KEYWORD_CHARS: usize = 3;

/// Whether a lowercase token is a stop-word.
pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Extract the ordered, distinct keywords of a query.
///
/// Lowercases, tokenizes, drops stop-words and tokens shorter than three
/// characters, and keeps first occurrences in order.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut seen = HashSet::new();

    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// Append a query's keywords to it for the initial vector search.
pub fn expand_query(query: &str) -> String {
    expand_with(query, &extract_keywords(query))
}

/// Append already-extracted keywords to a query.
pub fn expand_with(query: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query, keywords.join(" "))
    }
}
