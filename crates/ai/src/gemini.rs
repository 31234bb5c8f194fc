// Gemini client for content transformation
//
// Sends the value grid to the Gemini generateContent API and parses the
// structured response back into a grid.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::ApiKey;
use crate::transformer::{ContentTransformer, TransformError};

/// Production API base.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Per-request timeout, matching the Sheets client bound.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Gemini API types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
    #[allow(dead_code)]
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[allow(dead_code)]
    code: Option<i64>,
    #[allow(dead_code)]
    status: Option<String>,
}

// ============================================================================
// Transformer
// ============================================================================

/// Content transformer backed by the Gemini generateContent API.
pub struct GeminiTransformer {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiTransformer {
    /// Create a transformer against the production API.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_base_url(model, GEMINI_API_BASE.to_string())
    }

    /// Create a transformer against an explicit base URL (tests, proxies).
    pub fn with_base_url(model: impl Into<String>, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(format!("sheetbridge/{}", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ContentTransformer for GeminiTransformer {
    async fn transform(
        &self,
        values: &[Vec<String>],
        instruction: Option<&str>,
        key: &ApiKey,
    ) -> Result<Vec<Vec<String>>, TransformError> {
        let request = GeminiRequest {
            system_instruction: Content {
                parts: vec![Part { text: build_system_prompt() }],
            },
            contents: vec![Content {
                parts: vec![Part { text: build_user_prompt(values, instruction) }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3, // Lower temperature for more consistent output
                max_output_tokens: 8192,
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        log::debug!("POST {} ({} rows)", url, values.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| TransformError::Network(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error) = serde_json::from_str::<GeminiError>(&error_text) {
                return Err(TransformError::Api {
                    status: status.as_u16(),
                    message: error.error.message,
                });
            }
            return Err(TransformError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let response_body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| TransformError::Parse(e.to_string()))?;

        let content = response_body
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .ok_or_else(|| TransformError::InvalidResponse("No candidates in response".to_string()))?;

        let (grid, warnings) = parse_value_grid(&content)?;
        for warning in warnings {
            log::warn!("{}", warning);
        }

        if grid.is_empty() {
            return Err(TransformError::InvalidResponse(
                "Transformed grid is empty".to_string(),
            ));
        }
        if grid.len() != values.len() {
            log::warn!(
                "Transformed grid has {} rows, source had {}",
                grid.len(),
                values.len()
            );
        }

        Ok(grid)
    }
}

fn build_system_prompt() -> String {
    r#"You are a spreadsheet content transformer. You receive a grid of cell values and rewrite it.

CRITICAL INSTRUCTIONS:
1. Return ONLY a valid JSON array of arrays of strings (the transformed grid)
2. Keep the same number of rows and the same number of columns as INPUT
3. Every cell must be a string
4. Do NOT include any text before or after the JSON
5. Do NOT use markdown code blocks

DEFAULT BEHAVIOR:
- Without an INSTRUCTION section, rewrite each cell for clarity and correctness while keeping its meaning
- Leave empty cells empty

RESPONSE FORMAT:
[["cell", "cell"], ["cell", "cell"]]"#
        .to_string()
}

fn build_user_prompt(values: &[Vec<String>], instruction: Option<&str>) -> String {
    let mut prompt = String::new();

    prompt.push_str("INPUT:\n");
    // Grids are plain string matrices; serialization cannot fail
    prompt.push_str(&serde_json::to_string(values).unwrap_or_default());
    prompt.push('\n');

    if let Some(instruction) = instruction {
        prompt.push_str("\nINSTRUCTION:\n");
        prompt.push_str(instruction);
        prompt.push('\n');
    }

    prompt.push_str("\nRemember: Return ONLY a JSON array of arrays of strings.");

    prompt
}

fn parse_value_grid(content: &str) -> Result<(Vec<Vec<String>>, Vec<String>), TransformError> {
    let mut warnings = Vec::new();

    // Try to parse as JSON
    let parsed: Vec<Vec<String>> = match serde_json::from_str(content) {
        Ok(p) => p,
        Err(e) => {
            // Try to extract JSON from the response if it's wrapped in
            // markdown; a span only exists when `[` precedes `]`
            let span = match (content.find('['), content.rfind(']')) {
                (Some(start), Some(end)) if start <= end => &content[start..=end],
                _ => {
                    return Err(TransformError::Parse(format!(
                        "Response is not JSON: {}. Raw: {}",
                        e, content
                    )));
                }
            };
            match serde_json::from_str(span) {
                Ok(p) => {
                    warnings.push("Response contained extra text around JSON".to_string());
                    p
                }
                Err(_) => {
                    return Err(TransformError::Parse(format!(
                        "Failed to parse JSON: {}. Raw: {}",
                        e, content
                    )));
                }
            }
        }
    };

    Ok((parsed, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_valid_grid() {
        let content = r#"[["a", "b"], ["c", "d"]]"#;
        let (parsed, warnings) = parse_value_grid(content).unwrap();
        assert_eq!(parsed, grid(&[&["a", "b"], &["c", "d"]]));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_grid_with_markdown() {
        let content = "Here you go:\n```json\n[[\"a\"], [\"b\"]]\n```";
        let (parsed, warnings) = parse_value_grid(content).unwrap();
        assert_eq!(parsed, grid(&[&["a"], &["b"]]));
        assert!(!warnings.is_empty()); // Should warn about extra text
    }

    #[test]
    fn test_parse_rejects_non_grid() {
        let err = parse_value_grid(r#"{"explanation": "not a grid"}"#).unwrap_err();
        assert!(matches!(err, TransformError::Parse(_)));

        let err = parse_value_grid("no json here at all").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse response: "));
    }

    #[test]
    fn test_parse_rejects_reversed_brackets() {
        // Last `]` before the first `[`: no plausible span to extract
        for raw in ["row 1] then [row 2", "]["] {
            let err = parse_value_grid(raw).unwrap_err();
            assert!(matches!(err, TransformError::Parse(_)), "input: {}", raw);
        }
    }

    #[test]
    fn test_user_prompt_includes_input_and_instruction() {
        let values = grid(&[&["What is 2+2?", "4"]]);

        let prompt = build_user_prompt(&values, Some("Answer in French"));
        assert!(prompt.contains("INPUT:"));
        assert!(prompt.contains(r#"[["What is 2+2?","4"]]"#));
        assert!(prompt.contains("INSTRUCTION:\nAnswer in French"));

        let without = build_user_prompt(&values, None);
        assert!(!without.contains("INSTRUCTION:"));
    }

    // ── HTTP path ──

    fn candidates_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                {
                    "content": { "parts": [{ "text": text }], "role": "model" },
                    "finishReason": "STOP"
                }
            ],
            "usageMetadata": { "promptTokenCount": 42, "candidatesTokenCount": 7 }
        })
    }

    #[tokio::test]
    async fn test_transform_success() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-2.0-flash:generateContent")
                    .header("x-goog-api-key", "test-key");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(candidates_body(r#"[["Refined A"], ["Refined B"]]"#));
            })
            .await;

        let transformer = GeminiTransformer::with_base_url("gemini-2.0-flash", server.base_url());
        let out = transformer
            .transform(&grid(&[&["a"], &["b"]]), None, &ApiKey::new("test-key"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(out, grid(&[&["Refined A"], &["Refined B"]]));
    }

    #[tokio::test]
    async fn test_transform_api_error_uses_provider_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.0-flash:generateContent");
                then.status(400)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "error": {
                            "code": 400,
                            "message": "API key not valid. Please pass a valid API key.",
                            "status": "INVALID_ARGUMENT"
                        }
                    }));
            })
            .await;

        let transformer = GeminiTransformer::with_base_url("gemini-2.0-flash", server.base_url());
        let err = transformer
            .transform(&grid(&[&["a"]]), None, &ApiKey::new("bad-key"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "API error (400): API key not valid. Please pass a valid API key."
        );
    }

    #[tokio::test]
    async fn test_transform_rejects_empty_grid() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.0-flash:generateContent");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(candidates_body("[]"));
            })
            .await;

        let transformer = GeminiTransformer::with_base_url("gemini-2.0-flash", server.base_url());
        let err = transformer
            .transform(&grid(&[&["a"]]), None, &ApiKey::new("test-key"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid response: Transformed grid is empty");
    }

    #[tokio::test]
    async fn test_transform_no_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1beta/models/gemini-2.0-flash:generateContent");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "candidates": [] }));
            })
            .await;

        let transformer = GeminiTransformer::with_base_url("gemini-2.0-flash", server.base_url());
        let err = transformer
            .transform(&grid(&[&["a"]]), None, &ApiKey::new("test-key"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid response: No candidates in response");
    }
}
