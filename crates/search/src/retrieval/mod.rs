//! Chunk retrieval
//!
//! Ranks the chunks of a single document against a question by keyword
//! overlap and returns the best `top_k`. Everything here is synchronous
//! and pure apart from metrics.

mod lexical;

pub use lexical::{keywords, score};

use docchat_common::metrics;
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

/// A chunk paired with its relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoredChunk<'a> {
    /// Position of the chunk in the source document
    pub index: usize,

    /// Chunk text
    pub content: &'a str,

    /// Number of query keywords found in the chunk
    pub score: usize,
}

/// Score every chunk and order them by relevance.
///
/// Chunks with equal scores keep their original relative order.
pub fn rank<'a>(query: &str, chunks: &'a [String]) -> Vec<ScoredChunk<'a>> {
    let query_keywords = keywords(query);

    let mut scored: Vec<ScoredChunk<'a>> = chunks
        .par_iter()
        .enumerate()
        .map(|(index, chunk)| ScoredChunk {
            index,
            content: chunk.as_str(),
            score: score(&query_keywords, chunk),
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// Return the `top_k` most relevant chunks, best first.
///
/// Returns every chunk when fewer than `top_k` exist and nothing when
/// `top_k` is zero. Zero-scoring chunks are still eligible.
pub fn retrieve(query: &str, chunks: &[String], top_k: usize) -> Vec<String> {
    let start = Instant::now();

    let selected: Vec<String> = rank(query, chunks)
        .into_iter()
        .take(top_k)
        .map(|scored| scored.content.to_string())
        .collect();

    let elapsed = start.elapsed();
    metrics::record_retrieval(elapsed.as_secs_f64(), chunks.len(), selected.len());
    tracing::debug!(
        candidates = chunks.len(),
        top_k = top_k,
        returned = selected.len(),
        elapsed_us = elapsed.as_micros() as u64,
        "Chunks retrieved"
    );

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_ingestion::chunk_text;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_best_chunk_first() {
        let chunks = chunks(&[
            "The weather is nice today.",
            "Paris is the capital of France.",
            "Berlin is the capital of Germany.",
        ]);
        let top = retrieve("What is the capital of France?", &chunks, 1);
        assert_eq!(top, vec!["Paris is the capital of France.".to_string()]);
    }

    #[test]
    fn test_ties_keep_source_order() {
        let chunks = chunks(&["alpha one", "beta one", "gamma one", "delta"]);
        let ranked = rank("one", &chunks);
        let order: Vec<usize> = ranked.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
        assert_eq!(ranked[3].score, 0);
    }

    #[test]
    fn test_higher_score_overtakes_earlier_chunk() {
        let chunks = chunks(&["red", "red green", "red green blue", "green"]);
        let ranked = rank("red green blue", &chunks);
        let order: Vec<usize> = ranked.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![2, 1, 0, 3]);
        let scores: Vec<usize> = ranked.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![3, 2, 1, 1]);
    }

    #[test]
    fn test_top_k_bounds() {
        let chunks = chunks(&["a", "b", "c"]);
        assert!(retrieve("a", &chunks, 0).is_empty());
        assert_eq!(retrieve("a", &chunks, 1000).len(), 3);
        assert!(retrieve("a", &[], 3).is_empty());
    }

    #[test]
    fn test_all_zero_scores_return_source_order() {
        let chunks = chunks(&["first chunk", "second chunk", "third chunk"]);
        let top = retrieve("unrelated question", &chunks, 2);
        assert_eq!(top, vec!["first chunk".to_string(), "second chunk".to_string()]);
    }

    #[test]
    fn test_retrieval_precision_smoke() {
        let document = "Paris is the capital city of France. It is known for the Eiffel Tower. \
                        Berlin is the capital of Germany and has a long history. \
                        London is the capital of the United Kingdom and sits on the Thames.";
        let chunks = chunk_text(document, 50);
        assert!(chunks.len() >= 3);

        let top = retrieve("What is the capital of France?", &chunks, 2);
        assert_eq!(top.len(), 2);
        let joined = top.join(" ").to_lowercase();
        assert!(joined.contains("paris") || joined.contains("france"));
    }

    #[test]
    fn test_rank_is_deterministic() {
        let document = "one two three four five six seven eight nine ten ".repeat(40);
        let chunks = chunk_text(&document, 30);
        let first = rank("three seven ten", &chunks);
        let second = rank("three seven ten", &chunks);
        assert_eq!(first, second);
    }
}
