//! C2: Retrieval Index. Chunking, embedding, storage, and k-nearest-neighbor
//! search over a regulatory corpus with metadata filters.

pub mod chunk;
pub mod lexical;
pub mod search;
pub mod store;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::ModelAdapter;

pub use chunk::{chunk_text, ChunkMetadata, DocumentChunk};
pub use search::{exact_knn, ScoredChunk, SearchResult};
pub use store::{ChunkSnapshot, MetadataFilter};

/// A document to ingest: an opaque byte stream (already assumed UTF-8
/// text — binary parsing of raw formats is handled upstream by the object
/// store) with attached metadata applied to every chunk produced from it.
pub struct SourceDocument {
    pub document_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// One chunk's ingestion failure, collected rather than aborting the whole
/// batch.
#[derive(Debug, Clone)]
pub struct IngestError {
    pub document_id: String,
    pub ordinal: u32,
    pub reason: String,
}

pub struct IngestReport {
    pub chunks_stored: usize,
    pub errors: Vec<IngestError>,
}

pub struct RetrievalIndex {
    store: store::ChunkStore,
    model: Arc<dyn ModelAdapter>,
    chunk_size_chars: usize,
    chunk_overlap_chars: usize,
    exact_ceiling_chunks: usize,
}

impl RetrievalIndex {
    pub fn new(
        db_path: &str,
        model: Arc<dyn ModelAdapter>,
        chunk_size_chars: usize,
        chunk_overlap_chars: usize,
        exact_ceiling_chunks: usize,
    ) -> Result<Self> {
        Ok(RetrievalIndex {
            store: store::ChunkStore::open(db_path)?,
            model,
            chunk_size_chars,
            chunk_overlap_chars,
            exact_ceiling_chunks,
        })
    }

    /// Chunks, embeds, and atomically stores `document`. A single chunk's
    /// embedding failure is recorded in the report; the remaining chunks of
    /// the document are still stored and the index stays usable.
    ///
    /// A re-ingestion whose window at a given ordinal is byte-identical to
    /// what is already stored there reuses the stored embedding instead of
    /// paying for another `embed` call — re-ingesting an unchanged document
    /// (a common poll-for-updates pattern against the upstream object
    /// store) should not re-embed text nothing has touched.
    pub async fn ingest(&self, document: SourceDocument) -> Result<IngestReport> {
        let windows = chunk::chunk_text(&document.text, self.chunk_size_chars, self.chunk_overlap_chars);
        let previous = self.store.snapshot();

        let mut chunks = Vec::with_capacity(windows.len());
        let mut errors = Vec::new();

        for (ordinal, text) in windows.into_iter().enumerate() {
            let ordinal = ordinal as u32;
            let reusable = previous.chunks.iter().find(|c| {
                c.document_id == document.document_id
                    && c.ordinal == ordinal
                    && content_hash(&c.text) == content_hash(&text)
            });

            let embedding = match reusable {
                Some(existing) => Ok(existing.embedding.clone()),
                None => self.model.embed(&text).await.map(|(embedding, _usage)| embedding),
            };

            match embedding {
                Ok(embedding) => chunks.push(DocumentChunk {
                    chunk_id: Uuid::new_v4(),
                    document_id: document.document_id.clone(),
                    ordinal,
                    text,
                    embedding,
                    metadata: document.metadata.clone(),
                }),
                Err(e) => errors.push(IngestError {
                    document_id: document.document_id.clone(),
                    ordinal,
                    reason: e.to_string(),
                }),
            }
        }

        let chunks_stored = chunks.len();
        if chunks_stored > 0 {
            self.store.replace_document(&document.document_id, chunks)?;
        }

        Ok(IngestReport { chunks_stored, errors })
    }

    /// Embeds `query_text` and scores candidates by exact cosine k-NN. Falls
    /// back to lexical/IDF scoring when embedding the query fails with
    /// `ModelUnavailable` after the adapter's own retries are exhausted.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<SearchResult> {
        let snapshot = self.store.snapshot();

        if snapshot.chunks.len() > self.exact_ceiling_chunks {
            tracing::warn!(
                chunk_count = snapshot.chunks.len(),
                ceiling = self.exact_ceiling_chunks,
                "retrieval index exceeds exact k-NN ceiling; continuing with exact search"
            );
        }

        match self.model.embed(query_text).await {
            Ok((embedding, _usage)) => {
                let chunks = search::exact_knn(&snapshot, &embedding, k, filter);
                Ok(SearchResult { chunks, used_fallback: false })
            }
            Err(Error::ModelUnavailable(_)) => {
                let chunks = search::lexical_search(&snapshot, query_text, k, filter);
                Ok(SearchResult { chunks, used_fallback: true })
            }
            Err(e) => Err(e),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.store.chunk_count()
    }
}

/// Hex-encoded SHA-256 of `text`, used only to detect whether a re-ingested
/// window's content actually changed — not a stored field, just a cheap
/// equality check cheaper than comparing full strings across a large corpus.
fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompletionOptions, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedEmbedAdapter {
        dimension: usize,
        fail: AtomicBool,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl ModelAdapter for FixedEmbedAdapter {
        async fn complete(&self, _: &str, _: &str, _: CompletionOptions) -> Result<(String, Usage)> {
            unimplemented!()
        }

        async fn embed(&self, text: &str) -> Result<(Vec<f32>, Usage)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::ModelUnavailable("down".into()));
            }
            let mut v = vec![0.0; self.dimension];
            v[0] = text.len() as f32;
            Ok((v, Usage::default()))
        }

        fn embedding_dimension(&self) -> usize {
            self.dimension
        }
    }

    fn index_with(fail: bool) -> RetrievalIndex {
        let model = Arc::new(FixedEmbedAdapter {
            dimension: 4,
            fail: AtomicBool::new(fail),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        RetrievalIndex::new(":memory:", model, 1000, 200, 100_000).unwrap()
    }

    #[tokio::test]
    async fn ingest_then_search_round_trips() {
        let index = index_with(false);
        index
            .ingest(SourceDocument {
                document_id: "doc-1".into(),
                text: "AML obligations under AUSTRAC require reporting.".into(),
                metadata: ChunkMetadata::new(),
            })
            .await
            .unwrap();

        let result = index.search("reporting", 3, &MetadataFilter::default()).await.unwrap();
        assert!(!result.used_fallback);
        assert!(!result.chunks.is_empty());
    }

    #[tokio::test]
    async fn search_falls_back_to_lexical_when_embeddings_unavailable() {
        let index = index_with(true);
        // Seed the store directly via ingest with a working adapter swap isn't
        // possible here; instead verify the fallback path activates and
        // returns no error even against an empty snapshot.
        let result = index.search("reporting", 3, &MetadataFilter::default()).await.unwrap();
        assert!(result.used_fallback);
        assert!(result.chunks.is_empty());
    }

    #[tokio::test]
    async fn reingesting_unchanged_text_does_not_re_embed() {
        let model = Arc::new(FixedEmbedAdapter {
            dimension: 4,
            fail: AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let index = RetrievalIndex::new(":memory:", model.clone(), 1000, 200, 100_000).unwrap();

        let doc = || SourceDocument {
            document_id: "doc-1".into(),
            text: "AML obligations under AUSTRAC require reporting.".into(),
            metadata: ChunkMetadata::new(),
        };

        index.ingest(doc()).await.unwrap();
        let calls_after_first = model.calls.load(Ordering::SeqCst);
        assert!(calls_after_first > 0);

        index.ingest(doc()).await.unwrap();
        assert_eq!(
            model.calls.load(Ordering::SeqCst),
            calls_after_first,
            "re-ingesting byte-identical text must not call embed again"
        );
        assert_eq!(index.chunk_count(), 1);
    }

    #[tokio::test]
    async fn reingesting_changed_text_re_embeds() {
        let model = Arc::new(FixedEmbedAdapter {
            dimension: 4,
            fail: AtomicBool::new(false),
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let index = RetrievalIndex::new(":memory:", model.clone(), 1000, 200, 100_000).unwrap();

        index
            .ingest(SourceDocument {
                document_id: "doc-1".into(),
                text: "Original text.".into(),
                metadata: ChunkMetadata::new(),
            })
            .await
            .unwrap();
        let calls_after_first = model.calls.load(Ordering::SeqCst);

        index
            .ingest(SourceDocument {
                document_id: "doc-1".into(),
                text: "Updated text with different content.".into(),
                metadata: ChunkMetadata::new(),
            })
            .await
            .unwrap();
        assert!(model.calls.load(Ordering::SeqCst) > calls_after_first);
    }
}
