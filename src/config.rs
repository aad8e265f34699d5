//! Flat configuration record, loaded from TOML: read a file into a `serde`
//! struct, validate, fail loudly — one record rather than a layered
//! system/team/project/user hierarchy, since this service has no multi-tenant
//! config story to support.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embedding_dimension: usize,
    pub chunk_size_chars: usize,
    pub chunk_overlap_chars: usize,
    pub subscriber_queue_depth: usize,
    pub publish_backpressure_deadline_ms: u64,
    pub model_complete_timeout_ms: u64,
    pub model_embed_timeout_ms: u64,
    pub model_retry_attempts: u32,
    pub handler_timeout_ms: u64,
    pub context_ttl_ms: u64,
    pub risk_score_flag_threshold: f64,
    pub compliance_block_threshold: f64,
    pub compliance_hold_threshold: f64,
    pub knowledge_quiet_period_ms: u64,
    pub retrieval_top_k: usize,
    pub retrieval_exact_ceiling_chunks: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            embedding_dimension: 768,
            chunk_size_chars: 1000,
            chunk_overlap_chars: 200,
            subscriber_queue_depth: 1024,
            publish_backpressure_deadline_ms: 2000,
            model_complete_timeout_ms: 30_000,
            model_embed_timeout_ms: 10_000,
            model_retry_attempts: 5,
            handler_timeout_ms: 30_000,
            context_ttl_ms: 600_000,
            risk_score_flag_threshold: 0.8,
            compliance_block_threshold: 0.95,
            compliance_hold_threshold: 0.9,
            knowledge_quiet_period_ms: 5000,
            retrieval_top_k: 5,
            retrieval_exact_ceiling_chunks: 100_000,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(Error::Validation("embedding_dimension must be > 0".into()));
        }
        if self.chunk_overlap_chars >= self.chunk_size_chars {
            return Err(Error::Validation(
                "chunk_overlap_chars must be smaller than chunk_size_chars".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.risk_score_flag_threshold) {
            return Err(Error::Validation(
                "risk_score_flag_threshold must be in [0.0, 1.0]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.compliance_block_threshold)
            || !(0.0..=1.0).contains(&self.compliance_hold_threshold)
        {
            return Err(Error::Validation(
                "compliance thresholds must be in [0.0, 1.0]".into(),
            ));
        }
        if self.compliance_hold_threshold > self.compliance_block_threshold {
            return Err(Error::Validation(
                "compliance_hold_threshold must not exceed compliance_block_threshold".into(),
            ));
        }
        Ok(())
    }
}
