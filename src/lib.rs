//! Multi-agent event orchestration core for a banking security system: a
//! pub/sub event bus that routes structured events across a fixed set of
//! cooperating AI-analysis agents, enriches their decisions with
//! retrieval-augmented context from a regulatory corpus, and guarantees
//! ordered causal progression of a transaction through risk, compliance,
//! action, and narration stages.
//!
//! # Components
//! - [`model`] — C1 Model Adapter: chat-completion and embedding endpoints.
//! - [`retrieval`] — C2 Retrieval Index: chunking, storage, k-NN search.
//! - [`bus`] — C3 Event Bus: topic-addressed pub/sub with retry and dead-letter.
//! - [`handlers`] — C4 Agent Handlers: the seven named specialists.
//! - [`supervisor`] — C5 Pipeline Supervisor: per-transaction stage tracking.
//!
//! [`orchestrator`] wires the five together into a runnable service.

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod handlers;
pub mod model;
pub mod orchestrator;
pub mod retrieval;
pub mod supervisor;

pub use config::Config;
pub use error::{Error, Result};
pub use event::{CorrelationId, Event, EventPayload};
