//! Wire codec for datagram payloads and HTTP responses.

use std::str::Utf8Error;

use serde_json::Value;

use crate::snapshot::Snapshot;

/// Reasons a datagram payload is rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode one datagram into a JSON tree.
///
/// Surrounding whitespace (including a trailing newline from the producer)
/// is ignored.
pub fn decode(bytes: &[u8]) -> Result<Value, DecodeError> {
    let text = std::str::from_utf8(bytes)?;
    let value = serde_json::from_str(text.trim())?;
    Ok(value)
}

/// Serialize a snapshot body for `/data`, pretty-printed with two-space
/// indentation.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, serde_json::Error> {
    encode_value(&snapshot.value)
}

pub fn encode_value(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(value)
}

/// Lossy, length-capped rendering of raw bytes for log lines.
pub fn preview(bytes: &[u8], max: usize) -> String {
    let end = bytes.len().min(max);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
