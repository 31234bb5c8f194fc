//! SheetBridge Extension Protocol — v1 Frozen Wire Format
//!
//! This crate defines the canonical message types exchanged between the
//! browser extension and the native host. Requests are JSON objects tagged
//! by a SCREAMING_SNAKE_CASE `type` field; responses always carry `success`,
//! a fixed response `type`, and `data` and/or `error`. Payload fields are
//! camelCase on the wire.
//!
//! # Protocol Version
//!
//! This is **protocol v1** — the wire format is frozen. Existing tags and
//! field names must not change; additions require:
//! 1. Version bump in PROTOCOL_VERSION
//! 2. Backward compatibility handling in the router
//!
//! # Usage
//!
//! ```ignore
//! use sheetbridge_protocol::{parse_message, ExtensionMessage, MessageResponse};
//!
//! let value: serde_json::Value = serde_json::from_slice(&frame)?;
//! match parse_message(&value) {
//!     Ok(ExtensionMessage::RefineAnswers { payload }) => { /* dispatch */ }
//!     Ok(ExtensionMessage::GenerateFeedback { payload }) => { /* dispatch */ }
//!     Err(err) => { /* reply with MessageResponse::error(err.to_string()) */ }
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Current protocol version. Increment for breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum accepted inbound frame size (browser → host), in bytes.
pub const MAX_INBOUND_MESSAGE: usize = 8 * 1024 * 1024;

/// Maximum outbound frame size (host → browser), in bytes. Chrome
/// disconnects a native host that sends a larger message.
pub const MAX_OUTBOUND_MESSAGE: usize = 1024 * 1024;

// =============================================================================
// Extension → Host Messages
// =============================================================================

/// Messages sent from the extension to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    /// Rewrite the values of a source range into a target range.
    RefineAnswers { payload: RefineAnswersPayload },
    /// Write feedback on a source range using a caller-supplied key.
    GenerateFeedback { payload: GenerateFeedbackPayload },
}

/// Payload for the refine-answers workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineAnswersPayload {
    pub spreadsheet_id: String,
    pub source_range: String,
    pub target_range: String,
    /// Extra instruction forwarded to the transformer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

/// Payload for the generate-feedback workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFeedbackPayload {
    pub spreadsheet_id: String,
    pub source_range: String,
    pub target_range: String,
    /// API key supplied by the caller for this run only.
    pub api_key: String,
}

/// Why a raw value failed to parse into an [`ExtensionMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// `type` was missing, not a string, or not a recognized tag.
    UnknownType,
    /// Recognized tag, but the payload did not deserialize.
    InvalidPayload(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::UnknownType => write!(f, "Unknown message type"),
            ParseError::InvalidPayload(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a decoded JSON value into a typed message.
///
/// Inspects the `type` tag first so that an unrecognized tag is reported
/// as [`ParseError::UnknownType`] regardless of the rest of the object,
/// while a recognized tag with a bad payload keeps the deserializer's
/// diagnostic.
pub fn parse_message(value: &serde_json::Value) -> Result<ExtensionMessage, ParseError> {
    match value.get("type").and_then(serde_json::Value::as_str) {
        Some("REFINE_ANSWERS") | Some("GENERATE_FEEDBACK") => {
            serde_json::from_value(value.clone())
                .map_err(|e| ParseError::InvalidPayload(e.to_string()))
        }
        _ => Err(ParseError::UnknownType),
    }
}

// =============================================================================
// Host → Extension Messages
// =============================================================================

/// Fixed response tags. Every response names the request it answers, or
/// `ERROR_RESPONSE` when no workflow was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseKind {
    RefineAnswersResponse,
    GenerateFeedbackResponse,
    ErrorResponse,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::RefineAnswersResponse => "REFINE_ANSWERS_RESPONSE",
            ResponseKind::GenerateFeedbackResponse => "GENERATE_FEEDBACK_RESPONSE",
            ResponseKind::ErrorResponse => "ERROR_RESPONSE",
        }
    }
}

/// Response envelope for every message.
///
/// `success` mirrors the inner report for workflow responses and is always
/// `false` for `ERROR_RESPONSE`. `data` carries the full workflow report,
/// failed runs included; `error` is set only on the error path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WorkflowReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    /// Wrap a workflow report under its fixed response tag.
    pub fn workflow(kind: ResponseKind, report: WorkflowReport) -> Self {
        MessageResponse {
            success: report.success,
            kind,
            data: Some(report),
            error: None,
        }
    }

    /// Error response for messages that never reached a workflow.
    pub fn error(message: impl Into<String>) -> Self {
        MessageResponse {
            success: false,
            kind: ResponseKind::ErrorResponse,
            data: None,
            error: Some(message.into()),
        }
    }

    /// The fixed reply to an unrecognized `type` tag.
    pub fn unknown_type() -> Self {
        MessageResponse::error("Unknown message type")
    }
}

/// Aggregate outcome of one workflow run.
///
/// Serialized into the response `data` field with the historic
/// `{success, data?, error?}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<WriteSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowReport {
    pub fn ok(data: WriteSummary) -> Self {
        WorkflowReport {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        WorkflowReport {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Summary of the write step (mirrors the Sheets update response).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteSummary {
    pub spreadsheet_id: String,
    pub updates: WriteCounts,
}

/// Row counts reported by the write step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCounts {
    #[serde(default)]
    pub updated_rows: u32,
}
