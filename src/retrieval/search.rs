//! k-nearest-neighbor search over a chunk snapshot: exact brute-force cosine
//! similarity with deterministic tie-breaking.

use super::chunk::DocumentChunk;
use super::lexical::lexical_scores;
use super::store::{ChunkSnapshot, MetadataFilter};

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunks: Vec<ScoredChunk>,
    /// Set when embeddings were unavailable and lexical/IDF scoring was used
    /// instead, so callers can downgrade confidence accordingly.
    pub used_fallback: bool,
}

/// Cosine similarity between two vectors of equal length. Returns 0.0 for a
/// zero-norm vector rather than dividing by zero — the data-model invariant
/// (`||embedding|| != 0`) means this should not arise for stored chunks, but
/// a defensively-safe value keeps ranking well-defined regardless.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn sort_and_truncate(mut scored: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
            .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
    });
    scored.truncate(k);
    scored
}

/// Exact brute-force k-NN by cosine similarity over the chunks in
/// `snapshot` matching `filter`, parallelized with `rayon` across
/// candidates. Ties are broken by ascending `(document_id, ordinal)`.
pub fn exact_knn(
    snapshot: &ChunkSnapshot,
    query_embedding: &[f32],
    k: usize,
    filter: &MetadataFilter,
) -> Vec<ScoredChunk> {
    use rayon::prelude::*;

    let scored: Vec<ScoredChunk> = snapshot
        .chunks
        .par_iter()
        .filter(|c| filter.matches(&c.metadata))
        .map(|c| ScoredChunk {
            chunk: c.clone(),
            score: cosine_similarity(query_embedding, &c.embedding),
        })
        .collect();

    sort_and_truncate(scored, k)
}

/// Lexical/IDF fallback search, used when embeddings are unavailable.
pub fn lexical_search(
    snapshot: &ChunkSnapshot,
    query_text: &str,
    k: usize,
    filter: &MetadataFilter,
) -> Vec<ScoredChunk> {
    let candidates: Vec<&DocumentChunk> = snapshot
        .chunks
        .iter()
        .filter(|c| filter.matches(&c.metadata))
        .collect();

    let scores = lexical_scores(query_text, &candidates);
    let scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .zip(scores)
        .filter(|(_, score)| *score > 0.0)
        .map(|(c, score)| ScoredChunk { chunk: c.clone(), score })
        .collect();

    sort_and_truncate(scored, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn chunk(document_id: &str, ordinal: u32, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            chunk_id: Uuid::new_v4(),
            document_id: document_id.into(),
            ordinal,
            text: "x".into(),
            embedding,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn ties_break_by_document_id_then_ordinal() {
        let snapshot = ChunkSnapshot {
            chunks: vec![
                chunk("b", 0, vec![1.0, 0.0]),
                chunk("a", 1, vec![1.0, 0.0]),
                chunk("a", 0, vec![1.0, 0.0]),
            ],
        };
        let results = exact_knn(&snapshot, &[1.0, 0.0], 3, &MetadataFilter::default());
        let order: Vec<(String, u32)> = results
            .iter()
            .map(|r| (r.chunk.document_id.clone(), r.chunk.ordinal))
            .collect();
        assert_eq!(
            order,
            vec![("a".to_string(), 0), ("a".to_string(), 1), ("b".to_string(), 0)]
        );
    }

    #[test]
    fn fewer_matches_than_k_returns_all() {
        let snapshot = ChunkSnapshot {
            chunks: vec![chunk("a", 0, vec![1.0, 0.0])],
        };
        let results = exact_knn(&snapshot, &[1.0, 0.0], 5, &MetadataFilter::default());
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn empty_snapshot_returns_empty_without_error() {
        let snapshot = ChunkSnapshot { chunks: vec![] };
        let results = exact_knn(&snapshot, &[1.0, 0.0], 5, &MetadataFilter::default());
        assert!(results.is_empty());
    }

    #[test]
    fn lexical_search_with_all_stop_word_query_returns_empty() {
        let mut a = chunk("a", 0, vec![]);
        a.text = "anti money laundering obligations".into();
        let mut b = chunk("b", 0, vec![]);
        b.text = "unrelated weather report today".into();
        let snapshot = ChunkSnapshot { chunks: vec![a, b] };

        let results = lexical_search(&snapshot, "the of and", 5, &MetadataFilter::default());
        assert!(results.is_empty());
    }

    #[test]
    fn lexical_search_drops_zero_score_candidates() {
        let mut a = chunk("a", 0, vec![]);
        a.text = "anti money laundering obligations".into();
        let mut b = chunk("b", 0, vec![]);
        b.text = "unrelated weather report today".into();
        let snapshot = ChunkSnapshot { chunks: vec![a, b] };

        let results = lexical_search(&snapshot, "laundering", 5, &MetadataFilter::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "a");
    }
}
