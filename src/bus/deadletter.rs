//! Per-topic dead-letter queue: bounded, inspectable, never automatically
//! redelivered.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::Event;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub event: Event,
    pub reason: String,
}

pub struct DeadLetterQueue {
    max_entries_per_topic: usize,
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    evicted: Mutex<u64>,
}

impl DeadLetterQueue {
    pub fn new(max_entries_per_topic: usize) -> Self {
        DeadLetterQueue {
            max_entries_per_topic,
            entries: Mutex::new(VecDeque::new()),
            evicted: Mutex::new(0),
        }
    }

    pub fn push(&self, event: Event, reason: String) {
        let mut entries = self.entries.lock().expect("dead letter queue poisoned");
        if entries.len() >= self.max_entries_per_topic {
            entries.pop_front();
            *self.evicted.lock().expect("dead letter queue poisoned") += 1;
        }
        entries.push_back(DeadLetterEntry { event, reason });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead letter queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted_count(&self) -> u64 {
        *self.evicted.lock().expect("dead letter queue poisoned")
    }

    pub fn snapshot(&self) -> Vec<DeadLetterEntry> {
        self.entries
            .lock()
            .expect("dead letter queue poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Writes every entry as one JSON object per line, for post-mortem
    /// inspection after shutdown.
    pub fn persist_jsonl(&self, path: &std::path::Path) -> Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(path)?;
        for entry in self.entries.lock().expect("dead letter queue poisoned").iter() {
            let line = serde_json::to_string(entry)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{CorrelationId, EventPayload};

    fn sample_event() -> Event {
        Event::new(
            "test",
            CorrelationId::new("c-1"),
            EventPayload::CustomerMessage { body: "hi".into() },
        )
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let q = DeadLetterQueue::new(2);
        q.push(sample_event(), "a".into());
        q.push(sample_event(), "b".into());
        q.push(sample_event(), "c".into());
        assert_eq!(q.len(), 2);
        assert_eq!(q.evicted_count(), 1);
    }

    #[test]
    fn persist_writes_one_json_object_per_line() {
        let q = DeadLetterQueue::new(10);
        q.push(sample_event(), "timeout".into());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dead_letters.jsonl");
        q.persist_jsonl(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
