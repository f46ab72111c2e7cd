//! Text chunking module
//!
//! Splits document text into word-aligned chunks for keyword retrieval.
//! A chunk grows one word at a time; each word adds its character count
//! plus one for the separating space. Once that running length reaches
//! `chunk_size` the chunk is sealed.

use tracing::debug;

/// Collapse every whitespace run to a single space and trim both ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into chunks of roughly `chunk_size` characters.
///
/// Words are never split: a word longer than `chunk_size` becomes a chunk
/// of its own. Every chunk but the last reaches `chunk_size`. Empty or
/// whitespace-only text yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;

    // split_whitespace yields exactly the words of the normalized text
    for word in text.split_whitespace() {
        current.push(word);
        current_len += word.chars().count() + 1;

        if current_len >= chunk_size {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    debug!(
        input_len = text.len(),
        chunk_count = chunks.len(),
        chunk_size = chunk_size,
        "Text chunked"
    );

    chunks
}
