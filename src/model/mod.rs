//! C1: Model Adapter. Uniform request/response to a chat-completion endpoint
//! and a text-embedding endpoint, with retry, timeout, and token accounting.

pub mod http;
pub mod retry;

pub use http::{HttpModelAdapter, HttpModelAdapterConfig};

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Token accounting for a single call, recorded for observability only — it
/// never affects correctness.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The two operations C4 handlers and C2's retrieval index call into. A
/// trait so tests and handler unit tests can swap in a deterministic mock
/// instead of reaching the network.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system: &str,
        options: CompletionOptions,
    ) -> Result<(String, Usage)>;

    async fn embed(&self, text: &str) -> Result<(Vec<f32>, Usage)>;

    /// The embedding dimension this adapter is configured to produce; used
    /// by callers to validate `embed`'s output length without re-deriving it.
    fn embedding_dimension(&self) -> usize;
}
