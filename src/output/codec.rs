//! Line codecs

use super::{DecodedLine, LineCodec};
use serde_json::Value;

/// Tag added to events whose line was not valid JSON
pub const JSON_PARSE_FAILURE_TAG: &str = "_jsonparsefailure";

fn strip_line_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Uses the raw line as the message
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl LineCodec for PlainCodec {
    fn decode(&self, line: &str) -> DecodedLine {
        DecodedLine {
            message: strip_line_terminator(line).to_string(),
            ..DecodedLine::default()
        }
    }
}

/// Parses each line as a JSON object
///
/// Top-level keys become fields; a string `message` key becomes the message.
/// Lines that are not JSON objects keep their raw text and are tagged with
/// [`JSON_PARSE_FAILURE_TAG`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl LineCodec for JsonLinesCodec {
    fn decode(&self, line: &str) -> DecodedLine {
        let raw = strip_line_terminator(line);
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => {
                let mut fields: std::collections::BTreeMap<String, Value> =
                    map.into_iter().collect();
                let message = match fields.remove("message") {
                    Some(Value::String(s)) => s,
                    Some(other) => {
                        // Keep non-string message values as a field
                        fields.insert("message".to_string(), other);
                        String::new()
                    }
                    None => String::new(),
                };
                DecodedLine {
                    message,
                    fields,
                    tags: Vec::new(),
                }
            }
            _ => DecodedLine {
                message: raw.to_string(),
                fields: Default::default(),
                tags: vec![JSON_PARSE_FAILURE_TAG.to_string()],
            },
        }
    }
}

/// Codec selection by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CodecKind {
    /// [`PlainCodec`]
    #[default]
    Plain,
    /// [`JsonLinesCodec`]
    Json,
}

impl CodecKind {
    /// Build the codec
    pub fn build(self) -> std::sync::Arc<dyn LineCodec> {
        match self {
            CodecKind::Plain => std::sync::Arc::new(PlainCodec),
            CodecKind::Json => std::sync::Arc::new(JsonLinesCodec),
        }
    }
}
