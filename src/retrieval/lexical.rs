//! Lexical/IDF fallback scoring, used when the model adapter's embedding
//! calls are exhausted.

use std::collections::{HashMap, HashSet};

use super::chunk::DocumentChunk;

/// Closed-class English words carrying no discriminating weight for lexical
/// matching. Stripped from the query only — document tokens keep them so IDF
/// still reflects true corpus-wide frequency.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "into",
    "is", "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will",
    "with",
];

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

fn tokenize_query(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|t| !STOP_WORDS.contains(&t.as_str())).collect()
}

/// Token-overlap score with IDF weighting: each query token present in the
/// chunk contributes `idf(token)`, where `idf` is computed over the full
/// candidate set passed in (not the whole corpus), matching "IDF weighting
/// over the filtered subset". A query that is empty, or made entirely of
/// stop words, has no discriminating tokens left after stripping and scores
/// every candidate 0.0 — `lexical_search` then returns no results for it
/// rather than an arbitrary top-k.
pub fn lexical_scores(query: &str, candidates: &[&DocumentChunk]) -> Vec<f32> {
    let query_tokens: Vec<String> = tokenize_query(query);
    if query_tokens.is_empty() || candidates.is_empty() {
        return vec![0.0; candidates.len()];
    }

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    let tokenized: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.text)).collect();

    for tokens in &tokenized {
        let unique: std::collections::HashSet<&str> =
            tokens.iter().map(|s| s.as_str()).collect();
        for t in unique {
            *doc_freq.entry(t).or_insert(0) += 1;
        }
    }

    let n = candidates.len() as f32;
    let idf = |term: &str| -> f32 {
        let df = *doc_freq.get(term).unwrap_or(&0) as f32;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    };

    tokenized
        .iter()
        .map(|tokens| {
            let token_set: std::collections::HashSet<&str> =
                tokens.iter().map(|s| s.as_str()).collect();
            query_tokens
                .iter()
                .filter(|qt| token_set.contains(qt.as_str()))
                .map(|qt| idf(qt))
                .sum()
        })
        .collect()
}
