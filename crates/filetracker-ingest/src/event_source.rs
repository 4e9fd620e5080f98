//! Raw notification feed, decoupled from any specific queue technology.
//! The engine only needs batches of raw JSON to decode; how those
//! batches arrive is this trait's problem, not the writer's.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::BufRead;

use filetracker_core::error::{TrackerError, TrackerResult};

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Pull the next batch of raw notification records. An empty `Vec`
    /// means the source is temporarily drained, not closed.
    async fn poll(&mut self) -> TrackerResult<Vec<Value>>;
}

/// Reads newline-delimited JSON from any `BufRead`, one line per record.
/// The minimal production entrypoint that doesn't presume a specific
/// queue: a Lambda-style handler hands this the event batch it already
/// received; a CLI hands it a file or stdin.
pub struct JsonLinesEventSource<R> {
    reader: R,
}

impl<R: BufRead> JsonLinesEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: BufRead + Send + Sync> EventSource for JsonLinesEventSource<R> {
    async fn poll(&mut self) -> TrackerResult<Vec<Value>> {
        let mut records = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).map_err(TrackerError::Io)?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            records.push(serde_json::from_str(trimmed)?);
        }
        Ok(records)
    }
}

/// In-memory test double: a fixed queue of pre-built batches.
#[derive(Default)]
pub struct InMemoryEventSource {
    batches: VecDeque<Vec<Value>>,
}

impl InMemoryEventSource {
    pub fn new(batches: Vec<Vec<Value>>) -> Self {
        Self { batches: batches.into() }
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn poll(&mut self) -> TrackerResult<Vec<Value>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn json_lines_source_decodes_one_record_per_line() {
        let input = "{\"a\":1}\n{\"a\":2}\n";
        let mut source = JsonLinesEventSource::new(input.as_bytes());
        let batch = source.poll().await.unwrap();
        assert_eq!(batch, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[tokio::test]
    async fn in_memory_source_drains_its_queued_batches_in_order() {
        let mut source = InMemoryEventSource::new(vec![vec![json!({"a": 1})], vec![json!({"a": 2})]]);
        assert_eq!(source.poll().await.unwrap(), vec![json!({"a": 1})]);
        assert_eq!(source.poll().await.unwrap(), vec![json!({"a": 2})]);
        assert_eq!(source.poll().await.unwrap(), Vec::<Value>::new());
    }
}
