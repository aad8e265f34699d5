//! Assistant Handler — subscribes to `user.query`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::event::{Event, EventPayload};
use crate::model::{CompletionOptions, ModelAdapter};
use crate::retrieval::{MetadataFilter, RetrievalIndex};

const TOPICS: &[&str] = &["user.query"];
const TOP_K: usize = 5;

pub struct AssistantHandler {
    model: Arc<dyn ModelAdapter>,
    retrieval: Arc<RetrievalIndex>,
}

impl AssistantHandler {
    pub fn new(model: Arc<dyn ModelAdapter>, retrieval: Arc<RetrievalIndex>) -> Self {
        AssistantHandler { model, retrieval }
    }
}

#[async_trait]
impl super::Handler for AssistantHandler {
    async fn handle(&self, event: &Event) -> Result<Vec<Event>> {
        let EventPayload::UserQuery { query_id, text } = &event.payload else {
            return Ok(vec![]);
        };

        let retrieval = self.retrieval.search(text, TOP_K, &MetadataFilter::default()).await?;
        let context = retrieval
            .chunks
            .iter()
            .map(|c| c.chunk.text.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let citations: Vec<String> = retrieval
            .chunks
            .iter()
            .map(|c| format!("{}#{}", c.chunk.document_id, c.chunk.ordinal))
            .collect();

        let prompt = format!("Question: {text}\n\nContext:\n{context}");
        let answer_text = match self
            .model
            .complete(&prompt, "Answer using only the provided context.", CompletionOptions::default())
            .await
        {
            Ok((text, _usage)) => text,
            Err(_) => "(model unavailable; unable to answer at this time)".to_string(),
        };

        Ok(vec![Event::new(
            self.name(),
            event.correlation_id.clone(),
            EventPayload::UserResponse { query_id: query_id.clone(), answer_text, citations },
        )])
    }

    fn name(&self) -> &str {
        "assistant"
    }

    fn topics(&self) -> &'static [&'static str] {
        TOPICS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CorrelationId;
    use crate::model::Usage;

    struct StubAdapter;

    #[async_trait]
    impl ModelAdapter for StubAdapter {
        async fn complete(&self, _: &str, _: &str, _: CompletionOptions) -> Result<(String, Usage)> {
            Ok(("the answer".to_string(), Usage::default()))
        }
        async fn embed(&self, _: &str) -> Result<(Vec<f32>, Usage)> {
            Ok((vec![0.0; 4], Usage::default()))
        }
        fn embedding_dimension(&self) -> usize {
            4
        }
    }

    #[tokio::test]
    async fn answers_with_citations() {
        use crate::handlers::Handler as _;
        use crate::retrieval::SourceDocument;

        let model = Arc::new(StubAdapter);
        let retrieval = Arc::new(RetrievalIndex::new(":memory:", model.clone(), 1000, 200, 100_000).unwrap());
        retrieval
            .ingest(SourceDocument {
                document_id: "doc-1".into(),
                text: "Relevant regulatory text.".into(),
                metadata: Default::default(),
            })
            .await
            .unwrap();

        let h = AssistantHandler::new(model, retrieval);
        let event = Event::new(
            "user",
            CorrelationId::new("c-1"),
            EventPayload::UserQuery { query_id: "q-1".into(), text: "What applies here?".into() },
        );
        let emitted = h.handle(&event).await.unwrap();
        assert_eq!(emitted.len(), 1);
        let EventPayload::UserResponse { answer_text, .. } = &emitted[0].payload else { panic!() };
        assert_eq!(answer_text, "the answer");
    }
}
