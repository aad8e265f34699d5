//! Sentiment Handler — subscribes to `customer.message`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventPayload};
use crate::model::{CompletionOptions, ModelAdapter};

use super::sentiment_lexicon;

const TOPICS: &[&str] = &["customer.message"];
const ALERT_THRESHOLD: f64 = -0.5;

pub struct SentimentHandler {
    model: Arc<dyn ModelAdapter>,
}

impl SentimentHandler {
    pub fn new(model: Arc<dyn ModelAdapter>) -> Self {
        SentimentHandler { model }
    }

    /// Asks the model for a numeric score and falls back to the
    /// deterministic lexicon whenever the model is unavailable or its
    /// response cannot be parsed into `[-1.0, 1.0]`.
    async fn score(&self, body: &str) -> f64 {
        let prompt = format!("Score the sentiment of this customer message from -1.0 to 1.0: \"{body}\"");
        match self.model.complete(&prompt, "Reply with only a number.", CompletionOptions::default()).await {
            Ok((text, _usage)) => match text.trim().parse::<f64>() {
                Ok(v) if (-1.0..=1.0).contains(&v) => v,
                _ => sentiment_lexicon::score(body),
            },
            Err(_) => sentiment_lexicon::score(body),
        }
    }
}

#[async_trait]
impl super::Handler for SentimentHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::CustomerMessage { body } = &event.payload else {
            return Ok(vec![]);
        };

        let sentiment_score = self.score(body).await;
        if sentiment_score > ALERT_THRESHOLD {
            return Ok(vec![]);
        }

        let excerpt: String = body.chars().take(200).collect();
        Ok(vec![Event::new(
            self.name(),
            event.correlation_id.clone(),
            EventPayload::OpsAlert {
                channel: "sentiment".to_string(),
                sentiment_score: Some(sentiment_score),
                excerpt: Some(excerpt),
                suggested_action: Some("escalate_to_retention_team".to_string()),
                summary_text: None,
                citations: vec![],
            },
        )])
    }

    fn name(&self) -> &str {
        "sentiment"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}
