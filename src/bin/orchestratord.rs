//! Binary entry point: loads config, wires the orchestrator, runs until a
//! shutdown signal, then drains and persists dead letters.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sentinel_orchestrator::bus::{FallbackTransport, RemoteTransport};
use sentinel_orchestrator::model::retry::ExponentialBackoff;
use sentinel_orchestrator::model::{HttpModelAdapter, HttpModelAdapterConfig};
use sentinel_orchestrator::model::ModelAdapter;
use sentinel_orchestrator::orchestrator::Orchestrator;
use sentinel_orchestrator::retrieval::RetrievalIndex;
use sentinel_orchestrator::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("SENTINEL_CONFIG").unwrap_or_else(|_| "sentinel.toml".to_string());
    let config = match Config::load_from(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %config_path, error = %e, "no config file loaded, using defaults");
            Config::default()
        }
    };

    let model_base_url = std::env::var("SENTINEL_MODEL_URL")
        .unwrap_or_else(|_| "http://localhost:8088".to_string());
    let model: Arc<dyn ModelAdapter> = Arc::new(HttpModelAdapter::new(HttpModelAdapterConfig {
        base_url: model_base_url,
        embedding_dimension: config.embedding_dimension,
        complete_timeout: Duration::from_millis(config.model_complete_timeout_ms),
        embed_timeout: Duration::from_millis(config.model_embed_timeout_ms),
        max_in_flight: 16,
        backoff: ExponentialBackoff { max_attempts: config.model_retry_attempts, ..ExponentialBackoff::default() },
    }));

    let db_path = std::env::var("SENTINEL_CHUNK_DB").unwrap_or_else(|_| "chunks.sqlite3".to_string());
    let retrieval = Arc::new(RetrievalIndex::new(
        &db_path,
        model.clone(),
        config.chunk_size_chars,
        config.chunk_overlap_chars,
        config.retrieval_exact_ceiling_chunks,
    )?);

    let remote: Option<Arc<dyn RemoteTransport>> = None;
    let fallback: Option<Arc<dyn FallbackTransport>> = None;
    let orchestrator = Orchestrator::build(&config, model, retrieval, remote, fallback);

    tracing::info!("sentinel orchestrator running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, draining");

    let dead_letter_dir = PathBuf::from(
        std::env::var("SENTINEL_DEAD_LETTER_DIR").unwrap_or_else(|_| "dead-letters".to_string()),
    );
    std::fs::create_dir_all(&dead_letter_dir)?;
    orchestrator.shutdown(Duration::from_secs(10), Some(&dead_letter_dir)).await;

    Ok(())
}
