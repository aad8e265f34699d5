//! Compliance Handler — subscribes to `risk.flagged`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventPayload};
use crate::model::{CompletionOptions, ModelAdapter};
use crate::retrieval::{MetadataFilter, RetrievalIndex};

const TOPICS: &[&str] = &["risk.flagged"];
const VALID_ACTIONS: &[&str] = &["monitor", "hold", "block", "report"];

pub struct ComplianceHandler {
    model: Arc<dyn ModelAdapter>,
    retrieval: Arc<RetrievalIndex>,
    block_threshold: f64,
    hold_threshold: f64,
}

impl ComplianceHandler {
    pub fn new(
        model: Arc<dyn ModelAdapter>,
        retrieval: Arc<RetrievalIndex>,
        block_threshold: f64,
        hold_threshold: f64,
    ) -> Self {
        ComplianceHandler { model, retrieval, block_threshold, hold_threshold }
    }

    /// `block` supersedes every other action at its own threshold; between
    /// the hold and block thresholds both `hold` and `report` apply; below
    /// that, `monitor` alone.
    fn fallback_actions(&self, score: f64) -> Vec<&'static str> {
        if score >= self.block_threshold {
            vec!["block"]
        } else if score >= self.hold_threshold {
            vec!["hold", "report"]
        } else {
            vec!["monitor"]
        }
    }

    async fn choose_actions(&self, score: f64, indicators: &[String], context: &str) -> Vec<&'static str> {
        let prompt = format!(
            "Transaction risk score {score:.2} with indicators {indicators:?}. Regulatory context:\n{context}\n\
             Respond with exactly one of: monitor, hold, block, report."
        );
        match self
            .model
            .complete(&prompt, "Select the compliance action.", CompletionOptions::default())
            .await
        {
            Ok((text, _usage)) => {
                let candidate = text.trim().to_lowercase();
                match VALID_ACTIONS.iter().find(|a| **a == candidate) {
                    Some(action) => vec![*action],
                    None => self.fallback_actions(score),
                }
            }
            Err(_) => self.fallback_actions(score),
        }
    }
}

#[async_trait]
impl super::Handler for ComplianceHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::RiskFlagged { transaction_id, score, indicators, citations, .. } = &event.payload
        else {
            return Ok(vec![]);
        };

        let filter = MetadataFilter::default().equals("regulator", "AUSTRAC");
        let retrieval = self
            .retrieval
            .search(&format!("AML CTF guidance for {indicators:?}"), 3, &filter)
            .await?;
        let context = retrieval
            .chunks
            .iter()
            .map(|c| c.chunk.text.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let retrieved_citations: Vec<String> = retrieval
            .chunks
            .iter()
            .map(|c| format!("{}#{}", c.chunk.document_id, c.chunk.ordinal))
            .collect();

        let actions = self.choose_actions(*score, indicators, &context).await;

        let mut all_citations = citations.clone();
        all_citations.extend(retrieved_citations);

        Ok(actions
            .into_iter()
            .map(|action| {
                Event::new(
                    self.name(),
                    event.correlation_id.clone(),
                    EventPayload::ComplianceAction {
                        transaction_id: transaction_id.clone(),
                        action: action.to_string(),
                        rationale_text: format!("score {score:.2} mapped to {action}"),
                        citations: all_citations.clone(),
                    },
                )
            })
            .collect())
    }

    fn name(&self) -> &str {
        "compliance"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}
