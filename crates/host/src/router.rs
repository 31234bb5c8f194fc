//! Message routing.
//!
//! Turns raw frames into typed messages, dispatches workflows, and maps
//! every outcome onto the fixed response tags. Routing never fails: bad
//! input becomes an `ERROR_RESPONSE`, a failed workflow keeps its own
//! response tag with the failure inside the report.

use serde_json::Value;
use sheetbridge_protocol::{
    parse_message, ExtensionMessage, MessageResponse, ParseError, ResponseKind, WorkflowReport,
    WriteCounts, WriteSummary,
};
use sheetbridge_sheets_client::UpdateResult;
use sheetbridge_workflow::{Orchestrator, WorkflowError};

pub struct MessageRouter {
    orchestrator: Orchestrator,
}

impl MessageRouter {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Handle one raw frame.
    pub async fn handle_bytes(&self, bytes: &[u8]) -> MessageResponse {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => self.handle_value(value).await,
            Err(e) => MessageResponse::error(format!("Malformed message: {}", e)),
        }
    }

    /// Handle one decoded message.
    ///
    /// Unrecognized `type` tags are answered without touching any
    /// workflow; a recognized tag with a bad payload reports the
    /// deserializer's diagnostic.
    pub async fn handle_value(&self, value: Value) -> MessageResponse {
        match parse_message(&value) {
            Ok(message) => self.dispatch(message).await,
            Err(ParseError::UnknownType) => MessageResponse::unknown_type(),
            Err(ParseError::InvalidPayload(detail)) => MessageResponse::error(detail),
        }
    }

    async fn dispatch(&self, message: ExtensionMessage) -> MessageResponse {
        match message {
            ExtensionMessage::RefineAnswers { payload } => {
                log::info!(
                    "refine-answers: {} -> {}",
                    payload.source_range,
                    payload.target_range
                );
                let report = report(self.orchestrator.refine_answers(&payload).await);
                MessageResponse::workflow(ResponseKind::RefineAnswersResponse, report)
            }
            ExtensionMessage::GenerateFeedback { payload } => {
                log::info!(
                    "generate-feedback: {} -> {}",
                    payload.source_range,
                    payload.target_range
                );
                let report = report(self.orchestrator.generate_feedback(&payload).await);
                MessageResponse::workflow(ResponseKind::GenerateFeedbackResponse, report)
            }
        }
    }
}

fn report(result: Result<UpdateResult, WorkflowError>) -> WorkflowReport {
    match result {
        Ok(outcome) => WorkflowReport::ok(WriteSummary {
            spreadsheet_id: outcome.spreadsheet_id,
            updates: WriteCounts {
                updated_rows: outcome.updates.updated_rows,
            },
        }),
        Err(err) => {
            log::warn!("workflow failed: {}", err);
            WorkflowReport::failed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;
    use sheetbridge_ai::{ApiKey, ContentTransformer, SuppliedKey, TransformError};
    use sheetbridge_sheets_client::{SheetsClient, StaticTokenProvider};
    use std::sync::Arc;

    struct UppercaseTransformer;

    #[async_trait]
    impl ContentTransformer for UppercaseTransformer {
        async fn transform(
            &self,
            values: &[Vec<String>],
            _instruction: Option<&str>,
            _key: &ApiKey,
        ) -> Result<Vec<Vec<String>>, TransformError> {
            Ok(values
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_uppercase()).collect())
                .collect())
        }
    }

    fn router(server: &MockServer) -> MessageRouter {
        let sheets = SheetsClient::with_base_url(
            Arc::new(StaticTokenProvider::new("test-token")),
            server.base_url(),
        );
        let orchestrator = Orchestrator::new(sheets, Arc::new(UppercaseTransformer))
            .with_ambient_key(Arc::new(SuppliedKey::new("ambient-test-key")));
        MessageRouter::new(orchestrator)
    }

    // ── Test 1: unknown type gets the fixed error without dispatch ──

    #[tokio::test]
    async fn test_unknown_type_fixed_response() {
        let server = MockServer::start_async().await;
        let read_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/sheet-1/values/Sheet1!A1%3AA2");
                then.status(200).json_body(json!({ "range": "Sheet1!A1:A2" }));
            })
            .await;

        let router = router(&server);
        let response = router
            .handle_value(json!({ "type": "SYNC_EVERYTHING", "payload": {} }))
            .await;

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "type": "ERROR_RESPONSE",
                "error": "Unknown message type"
            })
        );
        read_mock.assert_calls_async(0).await;
    }

    // ── Test 2: missing type tag is also unknown ──

    #[tokio::test]
    async fn test_missing_type_is_unknown() {
        let server = MockServer::start_async().await;
        let router = router(&server);

        let response = router.handle_value(json!({ "payload": {} })).await;

        assert_eq!(response.kind, ResponseKind::ErrorResponse);
        assert_eq!(response.error.as_deref(), Some("Unknown message type"));
    }

    // ── Test 3: refine end to end ──

    #[tokio::test]
    async fn test_refine_answers_end_to_end() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sheet-1/values/Sheet1!A1%3AA2");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "range": "Sheet1!A1:A2",
                        "values": [["alpha"], ["beta"]]
                    }));
            })
            .await;
        let write_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/sheet-1/values/Sheet1!B1%3AB2")
                    .json_body(json!({ "values": [["ALPHA"], ["BETA"]] }));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "spreadsheetId": "sheet-1",
                        "updates": { "updatedRows": 2 }
                    }));
            })
            .await;

        let router = router(&server);
        let response = router
            .handle_bytes(
                json!({
                    "type": "REFINE_ANSWERS",
                    "payload": {
                        "spreadsheetId": "sheet-1",
                        "sourceRange": "Sheet1!A1:A2",
                        "targetRange": "Sheet1!B1:B2"
                    }
                })
                .to_string()
                .as_bytes(),
            )
            .await;

        write_mock.assert_async().await;
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["type"], "REFINE_ANSWERS_RESPONSE");
        assert_eq!(value["data"]["success"], true);
        assert_eq!(value["data"]["data"]["spreadsheetId"], "sheet-1");
        assert_eq!(value["data"]["data"]["updates"]["updatedRows"], 2);
        assert!(value.get("error").is_none());
    }

    // ── Test 4: failed workflow keeps its response tag ──

    #[tokio::test]
    async fn test_refine_failure_keeps_tag() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sheet-1/values/Sheet1!A1%3AA2");
                then.status(404).body("{\"error\":{\"message\":\"not found\"}}");
            })
            .await;

        let router = router(&server);
        let response = router
            .handle_value(json!({
                "type": "REFINE_ANSWERS",
                "payload": {
                    "spreadsheetId": "sheet-1",
                    "sourceRange": "Sheet1!A1:A2",
                    "targetRange": "Sheet1!B1:B2"
                }
            }))
            .await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["type"], "REFINE_ANSWERS_RESPONSE");
        assert_eq!(value["data"]["success"], false);
        assert_eq!(value["data"]["error"], "API request failed: 404 Not Found");
    }

    // ── Test 5: recognized tag, bad payload ──

    #[tokio::test]
    async fn test_invalid_payload_reports_diagnostic() {
        let server = MockServer::start_async().await;
        let router = router(&server);

        let response = router
            .handle_value(json!({
                "type": "REFINE_ANSWERS",
                "payload": { "sourceRange": "Sheet1!A1:A2" }
            }))
            .await;

        assert_eq!(response.kind, ResponseKind::ErrorResponse);
        assert!(!response.success);
        let error = response.error.unwrap_or_default();
        assert!(error.contains("spreadsheetId"), "error: {}", error);
    }

    // ── Test 6: frames that are not JSON at all ──

    #[tokio::test]
    async fn test_malformed_bytes() {
        let server = MockServer::start_async().await;
        let router = router(&server);

        let response = router.handle_bytes(b"not json {").await;

        assert_eq!(response.kind, ResponseKind::ErrorResponse);
        let error = response.error.unwrap_or_default();
        assert!(error.starts_with("Malformed message: "), "error: {}", error);
    }

    // ── Test 7: feedback end to end with the caller's key ──

    #[tokio::test]
    async fn test_generate_feedback_end_to_end() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sheet-1/values/Sheet1!A1%3AA1");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "range": "Sheet1!A1:A1", "values": [["answer"]] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/sheet-1/values/Sheet1!B1%3AB1");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "spreadsheetId": "sheet-1",
                        "updates": { "updatedRows": 1 }
                    }));
            })
            .await;

        let router = router(&server);
        let response = router
            .handle_value(json!({
                "type": "GENERATE_FEEDBACK",
                "payload": {
                    "spreadsheetId": "sheet-1",
                    "sourceRange": "Sheet1!A1:A1",
                    "targetRange": "Sheet1!B1:B1",
                    "apiKey": "caller-key"
                }
            }))
            .await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["type"], "GENERATE_FEEDBACK_RESPONSE");
        assert_eq!(value["data"]["data"]["updates"]["updatedRows"], 1);
    }
}
