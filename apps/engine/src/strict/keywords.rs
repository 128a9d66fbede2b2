//! Deterministic keyword extraction for job postings.
//!
//! The top-keyword list is never trusted from the model — it is computed
//! here and force-written onto the parsed object, then re-checked by the
//! validation battery.

use std::collections::HashMap;

pub const KEYWORD_COUNT: usize = 25;
pub const KEYWORD_SHORT_COUNT: usize = 10;

/// Fixed stop-word set. Order is irrelevant; membership is what matters.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "being", "below", "between", "both", "but", "by", "can", "could", "did",
    "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had",
    "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "just", "more", "most", "my", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your", "yours",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lower-case alphanumeric tokens with stop words, single characters, and
/// bare numbers removed.
pub fn meaningful_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= 2)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !is_stop_word(t))
        .map(String::from)
        .collect()
}

/// Compute the top-N keyword list: frequency descending, ties broken
/// lexicographically, padded by cyclic repetition when fewer than N distinct
/// tokens exist. Returns an empty list only when the text has no meaningful
/// tokens at all.
pub fn top_keywords(text: &str, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in meaningful_tokens(text) {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let distinct: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
    if distinct.is_empty() {
        return Vec::new();
    }

    (0..n).map(|i| distinct[i % distinct.len()].clone()).collect()
}

/// The short list is always the first `KEYWORD_SHORT_COUNT` entries of the
/// full list.
pub fn top_short(keywords: &[String]) -> Vec<String> {
    keywords.iter().take(KEYWORD_SHORT_COUNT).cloned().collect()
}
