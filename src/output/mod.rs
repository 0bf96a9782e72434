//! Line decoding and event delivery

use crate::Event;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod codec;
pub mod sink;

pub use codec::{CodecKind, JsonLinesCodec, PlainCodec, JSON_PARSE_FAILURE_TAG};
pub use sink::{ChannelSink, JsonLinesSink};

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Downstream queue has gone away
    #[error("sink closed")]
    Closed,

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Content decoded from one raw line, before source metadata is attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedLine {
    /// Message text
    pub message: String,
    /// Structured fields extracted by the codec
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Tags added by the codec
    pub tags: Vec<String>,
}

/// Turns one raw line into event content
pub trait LineCodec: Send + Sync {
    /// Decode a raw line. Decoding never drops a line; failures are tagged.
    fn decode(&self, line: &str) -> DecodedLine;
}

/// Downstream event queue
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Returning `Ok` means the event is handed off.
    async fn send(&self, event: Event) -> SinkResult<()>;

    /// Flush buffered events, if the sink buffers
    async fn flush(&self) -> SinkResult<()> {
        Ok(())
    }
}
