//! Scan model: slots, decoded payloads, previews and the combined document.
//!
//! A scan is only accepted when the decoded text is a JSON object. Key order
//! is preserved from the scanned text through preview and submission.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded QR payload: a JSON object in scan order
pub type Payload = Map<String, Value>;

/// Key under which the capture time is merged into slot data
pub const TIMESTAMP_KEY: &str = "timestamp";

/// One of the two scan positions in a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// First scan, the vehicle code
    A,
    /// Second scan, the location code
    B,
}

impl Slot {
    /// Label shown on the scan trigger
    pub fn label(self) -> &'static str {
        match self {
            Slot::A => "Vehicle",
            Slot::B => "Location",
        }
    }

    /// Key of this slot in the submitted document
    pub fn document_key(self) -> &'static str {
        match self {
            Slot::A => "Scan 1",
            Slot::B => "Scan 2",
        }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Why scanned text was rejected
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("scanned text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scanned JSON is {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Parse camera-delivered text into a payload.
pub fn parse_payload(raw: &str) -> Result<Payload, PayloadError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(PayloadError::NotAnObject(json_kind(&other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Render a capture time the way it goes on the wire (`2024-05-01T08:30:00.000Z`)
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A decoded and timestamped payload occupying one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub payload: Payload,
    pub captured_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn new(payload: Payload, captured_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            captured_at,
        }
    }

    /// Parse scanned text and stamp it with the capture time.
    pub fn decode(raw: &str, captured_at: DateTime<Utc>) -> Result<Self, PayloadError> {
        Ok(Self::new(parse_payload(raw)?, captured_at))
    }

    /// Payload with the capture timestamp merged in.
    ///
    /// An existing `timestamp` key keeps its position and gets the capture
    /// time as its value; otherwise the key is appended last.
    pub fn data(&self) -> Payload {
        let mut data = self.payload.clone();
        data.insert(
            TIMESTAMP_KEY.to_string(),
            Value::String(format_timestamp(&self.captured_at)),
        );
        data
    }
}

/// One `<key>: <JSON value>` line per top-level key, in key order.
pub fn format_preview(data: &Payload) -> String {
    data.iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Data wrapper for one slot in the submitted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    pub data: Payload,
}

/// Both scans bundled for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedDocument {
    #[serde(rename = "Scan 1")]
    pub scan_1: SlotData,
    #[serde(rename = "Scan 2")]
    pub scan_2: SlotData,
}

impl CombinedDocument {
    pub fn new(scan_a: &ScanResult, scan_b: &ScanResult) -> Self {
        Self {
            scan_1: SlotData {
                data: scan_a.data(),
            },
            scan_2: SlotData {
                data: scan_b.data(),
            },
        }
    }
}
