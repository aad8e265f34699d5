//! SQLite-backed chunk store with a lock-free read snapshot.
//!
//! A flat `(id, embedding, metadata)` table with brute-force cosine search,
//! generalized to the `DocumentChunk` shape, with reads routed through an
//! `ArcSwap<ChunkSnapshot>` instead of the same connection writes use: a
//! re-ingestion of one `document_id` builds the new in-memory snapshot off
//! to the side and swaps the pointer in one atomic step, so concurrent
//! readers never observe a half-swapped document and never block on the
//! swap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use rusqlite::{params, Connection};

use crate::error::Result;

use super::chunk::{ChunkMetadata, DocumentChunk};

#[derive(Debug, Default)]
pub struct ChunkSnapshot {
    pub chunks: Vec<DocumentChunk>,
}

pub struct ChunkStore {
    conn: Mutex<Connection>,
    snapshot: ArcSwap<ChunkSnapshot>,
}

impl ChunkStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS chunks (
                chunk_id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding TEXT NOT NULL,
                metadata TEXT NOT NULL,
                UNIQUE(document_id, ordinal)
            )",
            [],
        )?;
        let store = ChunkStore {
            conn: Mutex::new(conn),
            snapshot: ArcSwap::from_pointee(ChunkSnapshot::default()),
        };
        store.reload_snapshot_from_disk()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn reload_snapshot_from_disk(&self) -> Result<()> {
        let conn = self.conn.lock().expect("chunk store connection poisoned");
        let mut stmt =
            conn.prepare("SELECT chunk_id, document_id, ordinal, text, embedding, metadata FROM chunks")?;
        let rows = stmt.query_map([], |row| {
            let chunk_id: String = row.get(0)?;
            let document_id: String = row.get(1)?;
            let ordinal: i64 = row.get(2)?;
            let text: String = row.get(3)?;
            let embedding_json: String = row.get(4)?;
            let metadata_json: String = row.get(5)?;
            Ok((chunk_id, document_id, ordinal, text, embedding_json, metadata_json))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (chunk_id, document_id, ordinal, text, embedding_json, metadata_json) = row?;
            let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)?;
            chunks.push(DocumentChunk {
                chunk_id: uuid::Uuid::parse_str(&chunk_id)
                    .map_err(|e| crate::error::Error::Retrieval(e.to_string()))?,
                document_id,
                ordinal: ordinal as u32,
                text,
                embedding,
                metadata,
            });
        }
        self.snapshot.store(Arc::new(ChunkSnapshot { chunks }));
        Ok(())
    }

    /// Replaces every chunk belonging to `document_id` with `new_chunks` in
    /// one atomic step. `new_chunks` must already carry ordinals and
    /// embeddings; this method only persists and swaps.
    pub fn replace_document(&self, document_id: &str, new_chunks: Vec<DocumentChunk>) -> Result<()> {
        {
            let conn = self.conn.lock().expect("chunk store connection poisoned");
            let mut conn = conn;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM chunks WHERE document_id = ?1", params![document_id])?;
            for chunk in &new_chunks {
                let embedding_json = serde_json::to_string(&chunk.embedding)?;
                let metadata_json = serde_json::to_string(&chunk.metadata)?;
                tx.execute(
                    "INSERT INTO chunks (chunk_id, document_id, ordinal, text, embedding, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        chunk.chunk_id.to_string(),
                        chunk.document_id,
                        chunk.ordinal,
                        chunk.text,
                        embedding_json,
                        metadata_json,
                    ],
                )?;
            }
            tx.commit()?;
        }

        // Build the new snapshot off to the side, then swap atomically.
        // Readers holding the old Arc keep seeing the pre-swap snapshot.
        let current = self.snapshot.load();
        let mut chunks: Vec<DocumentChunk> = current
            .chunks
            .iter()
            .filter(|c| c.document_id != document_id)
            .cloned()
            .collect();
        chunks.extend(new_chunks);
        self.snapshot.store(Arc::new(ChunkSnapshot { chunks }));
        Ok(())
    }

    /// A cheap clone of the current `Arc` pointer — the read path never
    /// blocks on a concurrent `replace_document`.
    pub fn snapshot(&self) -> Arc<ChunkSnapshot> {
        self.snapshot.load_full()
    }

    pub fn chunk_count(&self) -> usize {
        self.snapshot.load().chunks.len()
    }
}

/// Equality/set-membership filter over chunk metadata fields.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    pub equals: HashMap<String, String>,
    pub one_of: HashMap<String, Vec<String>>,
}

impl MetadataFilter {
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn one_of(mut self, key: impl Into<String>, values: Vec<String>) -> Self {
        self.one_of.insert(key.into(), values);
        self
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        for (k, v) in &self.equals {
            if metadata.get(k) != Some(v) {
                return false;
            }
        }
        for (k, allowed) in &self.one_of {
            match metadata.get(k) {
                Some(v) if allowed.contains(v) => {}
                _ => return false,
            }
        }
        true
    }
}
