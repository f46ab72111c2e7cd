//! Keyword overlap scoring
//!
//! Keywords are the lowercased whitespace-separated tokens of a text.
//! Punctuation stays attached, so `France?` and `France.` are different
//! keywords. No stemming, stopwords or length normalization.

use std::collections::HashSet;

/// Extract the keyword set of a text
pub fn keywords(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Count how many query keywords also appear in the chunk
pub fn score(query_keywords: &HashSet<String>, chunk: &str) -> usize {
    if query_keywords.is_empty() {
        return 0;
    }
    keywords(chunk).intersection(query_keywords).count()
}
