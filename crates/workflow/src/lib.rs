//! Workflow orchestration.
//!
//! An orchestrator composes the Sheets client and a content transformer
//! into the two extension workflows: refine-answers (ambient key) and
//! generate-feedback (caller-supplied key). Both run the same pipeline:
//! read the source range, transform its values, write the target range.
//!
//! All-or-nothing: a failure at any stage halts the run, later stages are
//! never attempted, and nothing written before the failure is rolled back
//! (the write is the final stage, so a failed run writes nothing).

use std::sync::Arc;

use sheetbridge_ai::{AmbientKey, ApiKeySource, ContentTransformer, SuppliedKey, TransformError};
use sheetbridge_protocol::{GenerateFeedbackPayload, RefineAnswersPayload};
use sheetbridge_sheets_client::{SheetsClient, SheetsError, UpdateResult};

/// Built-in instruction for the feedback workflow.
const FEEDBACK_INSTRUCTION: &str = "For each input cell, replace its content with short, \
constructive feedback on that content. Keep the same number of rows and columns.";

/// Error from a workflow stage.
///
/// Display delegates to the stage error, so messages cross the wire exactly
/// as produced at their origin.
#[derive(Debug)]
pub enum WorkflowError {
    /// Reading the source range failed
    Read(SheetsError),
    /// The source range had no values to transform
    EmptySource { range: String },
    /// Key sourcing or the transform call failed
    Transform(TransformError),
    /// Writing the target range failed
    Write(SheetsError),
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Read(e) | WorkflowError::Write(e) => write!(f, "{}", e),
            WorkflowError::EmptySource { range } => {
                write!(f, "Source range {} has no values", range)
            }
            WorkflowError::Transform(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Read(e) | WorkflowError::Write(e) => Some(e),
            WorkflowError::Transform(e) => Some(e),
            WorkflowError::EmptySource { .. } => None,
        }
    }
}

/// Composes the Sheets client and the content transformer.
pub struct Orchestrator {
    sheets: SheetsClient,
    transformer: Arc<dyn ContentTransformer>,
    ambient_key: Arc<dyn ApiKeySource>,
}

impl Orchestrator {
    pub fn new(sheets: SheetsClient, transformer: Arc<dyn ContentTransformer>) -> Self {
        Self {
            sheets,
            transformer,
            ambient_key: Arc::new(AmbientKey),
        }
    }

    /// Replace the ambient key source (tests, embedding).
    pub fn with_ambient_key(mut self, source: Arc<dyn ApiKeySource>) -> Self {
        self.ambient_key = source;
        self
    }

    /// Rewrite the source range into the target range using the ambient key.
    pub async fn refine_answers(
        &self,
        request: &RefineAnswersPayload,
    ) -> Result<UpdateResult, WorkflowError> {
        self.run_pipeline(
            &request.spreadsheet_id,
            &request.source_range,
            &request.target_range,
            request.custom_prompt.as_deref(),
            self.ambient_key.as_ref(),
        )
        .await
    }

    /// Write feedback on the source range using the caller-supplied key.
    pub async fn generate_feedback(
        &self,
        request: &GenerateFeedbackPayload,
    ) -> Result<UpdateResult, WorkflowError> {
        let key = SuppliedKey::new(request.api_key.clone());
        self.run_pipeline(
            &request.spreadsheet_id,
            &request.source_range,
            &request.target_range,
            Some(FEEDBACK_INSTRUCTION),
            &key,
        )
        .await
    }

    async fn run_pipeline(
        &self,
        spreadsheet_id: &str,
        source_range: &str,
        target_range: &str,
        instruction: Option<&str>,
        key_source: &dyn ApiKeySource,
    ) -> Result<UpdateResult, WorkflowError> {
        let source = self
            .sheets
            .read_range(spreadsheet_id, source_range)
            .await
            .map_err(WorkflowError::Read)?;

        let values = match source.values {
            Some(values) if !values.is_empty() => values,
            _ => {
                return Err(WorkflowError::EmptySource {
                    range: source.range,
                })
            }
        };

        let key = key_source.api_key().map_err(WorkflowError::Transform)?;
        let transformed = self
            .transformer
            .transform(&values, instruction, &key)
            .await
            .map_err(WorkflowError::Transform)?;

        log::debug!(
            "writing {} transformed rows to {}",
            transformed.len(),
            target_range
        );
        self.sheets
            .update_range(spreadsheet_id, target_range, &transformed)
            .await
            .map_err(WorkflowError::Write)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
