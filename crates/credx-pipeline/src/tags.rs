//! Keyword tag extraction from article text.
//!
//! Pure function, no shared state: lowercases, strips URLs and
//! non-letters, filters stopwords and short tokens, then ranks unigrams
//! and bigrams by frequency. The title is tripled before counting so
//! title terms outrank body terms at equal body frequency.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid regex"));
static NON_LETTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z\s]").expect("valid regex"));

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "and", "any", "are", "because",
    "been", "before", "being", "below", "between", "both", "but", "can", "could", "did", "does",
    "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "her", "here", "hers", "him", "his", "how", "into", "its", "itself", "just", "more",
    "most", "not", "now", "off", "once", "only", "other", "our", "ours", "out", "over", "own",
    "same", "she", "should", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "then", "there", "these", "they", "this", "those", "through", "too", "under", "until", "very",
    "was", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours",
];

/// Lowercase, strip URLs and non-letters, keep informative tokens.
fn tokenize(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let text = URL_RE.replace_all(&text, "");
    let text = NON_LETTER_RE.replace_all(&text, "");
    text.split_whitespace()
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Extract the `top_k` highest-frequency unigram and bigram tags.
///
/// Ties break alphabetically so output is deterministic for a given
/// input.
pub fn extract_tags(title: &str, content: &str, top_k: usize) -> Vec<String> {
    if top_k == 0 {
        return Vec::new();
    }

    // Repeat the title so its terms carry triple weight.
    let weighted = format!("{title} {title} {title} {content}");
    let tokens = tokenize(&weighted);

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry(token.clone()).or_default() += 1;
    }
    for pair in tokens.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_k);

    let tags: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
    debug!(count = tags.len(), "extracted tags");
    tags
}
