//! Risk Handler — subscribes to `transaction.created`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Timelike;

use crate::error::Result;
use crate::event::{Event, EventPayload};
use crate::model::{CompletionOptions, ModelAdapter};
use crate::retrieval::{MetadataFilter, RetrievalIndex};

const TOPICS: &[&str] = &["transaction.created"];

pub struct RiskHandler {
    model: Arc<dyn ModelAdapter>,
    retrieval: Arc<RetrievalIndex>,
    flag_threshold: f64,
    home_jurisdiction: String,
}

impl RiskHandler {
    pub fn new(
        model: Arc<dyn ModelAdapter>,
        retrieval: Arc<RetrievalIndex>,
        flag_threshold: f64,
        home_jurisdiction: impl Into<String>,
    ) -> Self {
        RiskHandler { model, retrieval, flag_threshold, home_jurisdiction: home_jurisdiction.into() }
    }

    /// Amount vs. absolute thresholds, approximated in place of account
    /// history the core does not own.
    fn amount_contribution(amount: &str) -> f64 {
        let value: f64 = amount.parse().unwrap_or(0.0);
        if value >= 50_000.0 {
            0.5
        } else if value >= 10_000.0 {
            0.3
        } else if value >= 5_000.0 {
            0.1
        } else {
            0.0
        }
    }

    fn score_and_indicators(
        &self,
        amount: &str,
        destination_jurisdiction: &str,
        initiated_at: &chrono::DateTime<chrono::FixedOffset>,
        velocity_indicator: Option<f64>,
    ) -> (f64, Vec<String>) {
        let mut score = 0.0;
        let mut indicators = Vec::new();

        let amount_contribution = Self::amount_contribution(amount);
        if amount_contribution > 0.0 {
            score += amount_contribution;
            indicators.push("large_amount".to_string());
        }

        if (0..5).contains(&initiated_at.hour()) {
            score += 0.2;
            indicators.push("off_hours".to_string());
        }

        if destination_jurisdiction != self.home_jurisdiction {
            score += 0.3;
            indicators.push("cross_jurisdiction".to_string());
        }

        if let Some(velocity) = velocity_indicator {
            let contribution = velocity.clamp(0.0, 0.3);
            if contribution > 0.0 {
                score += contribution;
                indicators.push("velocity".to_string());
            }
        }

        (score.min(1.0), indicators)
    }
}

#[async_trait]
impl super::Handler for RiskHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::TransactionCreated {
            transaction_id,
            amount,
            destination_jurisdiction,
            initiated_at,
            velocity_indicator,
            ..
        } = &event.payload
        else {
            return Ok(vec![]);
        };

        let (score, indicators) =
            self.score_and_indicators(amount, destination_jurisdiction, initiated_at, *velocity_indicator);

        if score < self.flag_threshold {
            return Ok(vec![]);
        }

        let filter = MetadataFilter::default().one_of(
            "regulator",
            vec!["AUSTRAC".to_string(), "APRA".to_string()],
        );
        let retrieval = self.retrieval.search("transaction risk indicators", 3, &filter).await?;
        let citations: Vec<String> = retrieval
            .chunks
            .iter()
            .map(|c| format!("{}#{}", c.chunk.document_id, c.chunk.ordinal))
            .collect();

        let prompt = format!(
            "Transaction {transaction_id}: amount {amount}, indicators {indicators:?}, score {score:.2}. \
             Regulatory context:\n{}",
            retrieval.chunks.iter().map(|c| c.chunk.text.clone()).collect::<Vec<_>>().join("\n")
        );

        let (justification_text, citations) = match self
            .model
            .complete(&prompt, "Summarize the risk justification concisely.", CompletionOptions::default())
            .await
        {
            Ok((text, _usage)) => (text, citations),
            Err(_) => ("(model unavailable; numeric features only)".to_string(), vec![]),
        };

        Ok(vec![Event::new(
            self.name(),
            event.correlation_id.clone(),
            EventPayload::RiskFlagged {
                transaction_id: transaction_id.clone(),
                score,
                indicators,
                justification_text,
                citations,
            },
        )])
    }

    fn name(&self) -> &str {
        "risk"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}
