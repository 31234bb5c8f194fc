//! Sheets HTTP client.
//!
//! Async reqwest client. Covers the four operations the extension uses:
//! metadata → read → append → update.
//!
//! Every operation runs the same sequence: acquire token, build URL, one
//! authenticated request, check status, parse JSON. The error renderings
//! are part of the wire contract — the extension shows them verbatim.

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::auth::TokenProvider;

/// Production API base.
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Per-request timeout. The legacy behavior was to wait on the platform
/// default, which in practice meant "forever"; a stuck native host is
/// worse than a failed workflow, so requests are bounded.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Component-style encoding for range segments: ASCII alphanumerics and
/// `-_.!~*'()` pass through, everything else (including `:` and space)
/// is percent-encoded. `Sheet1!A1:C3` becomes `Sheet1!A1%3AC3`.
const RANGE_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode_range(range: &str) -> String {
    utf8_percent_encode(range, RANGE_SEGMENT).to_string()
}

/// Error type for Sheets operations.
#[derive(Debug, Clone)]
pub enum SheetsError {
    /// Token acquisition failed; no request was made
    Auth(String),
    /// Non-2xx HTTP status; the body is intentionally not read
    Api { status: u16, status_text: String },
    /// Network or response-decode failure
    Transport(String),
}

impl std::fmt::Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsError::Auth(reason) => write!(f, "Authentication failed: {}", reason),
            SheetsError::Api { status, status_text } => {
                write!(f, "API request failed: {} {}", status, status_text)
            }
            SheetsError::Transport(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

impl std::error::Error for SheetsError {}

// ── Response shapes ────────────────────────────────────────────────────────

/// Spreadsheet metadata (title and sheet list).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMetadata {
    pub spreadsheet_id: String,
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<SheetEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadsheetProperties {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetEntry {
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetProperties {
    pub title: String,
}

/// Values read from a range.
///
/// `values` is `None` when the range is empty — the API omits the field
/// entirely rather than sending an empty array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeData {
    pub range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Vec<String>>>,
}

/// Result of an append.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResult {
    pub spreadsheet_id: String,
    pub updates: UpdateCounts,
}

/// Result of an update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub spreadsheet_id: String,
    pub updates: UpdateCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCounts {
    #[serde(default)]
    pub updated_rows: u32,
}

// ── Client ─────────────────────────────────────────────────────────────────

/// Google Sheets API client (async).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn TokenProvider>,
}

impl SheetsClient {
    /// Create a client against the production API.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(auth, SHEETS_API_BASE.to_string())
    }

    /// Create a client against an explicit base URL (tests, local mocks).
    pub fn with_base_url(auth: Arc<dyn TokenProvider>, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(format!("sheetbridge/{}", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Fetch spreadsheet title and sheet list.
    pub async fn get_metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMetadata, SheetsError> {
        let token = self.token().await?;
        let url = format!("{}/{}", self.base_url, spreadsheet_id);
        log::debug!("GET {}", url);
        self.execute(self.http.get(&url).bearer_auth(token)).await
    }

    /// Read a range of values.
    pub async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<RangeData, SheetsError> {
        let token = self.token().await?;
        let url = format!(
            "{}/{}/values/{}",
            self.base_url,
            spreadsheet_id,
            encode_range(range)
        );
        log::debug!("GET {}", url);
        self.execute(self.http.get(&url).bearer_auth(token)).await
    }

    /// Append rows after the last populated row of `range`. Values are
    /// written literally (`RAW`), no formula or locale interpretation.
    pub async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<AppendResult, SheetsError> {
        let token = self.token().await?;
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW",
            self.base_url,
            spreadsheet_id,
            encode_range(range)
        );
        log::debug!("POST {} ({} rows)", url, values.len());
        let body = serde_json::json!({
            "values": values,
            "valueInputOption": "RAW",
        });
        self.execute(self.http.post(&url).bearer_auth(token).json(&body)).await
    }

    /// Overwrite `range` with `values` (`RAW` input semantics).
    pub async fn update_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<UpdateResult, SheetsError> {
        let token = self.token().await?;
        let url = format!(
            "{}/{}/values/{}?valueInputOption=RAW",
            self.base_url,
            spreadsheet_id,
            encode_range(range)
        );
        log::debug!("PUT {} ({} rows)", url, values.len());
        let body = serde_json::json!({ "values": values });
        self.execute(self.http.put(&url).bearer_auth(token).json(&body)).await
    }

    // ── Internal helpers ───────────────────────────────────────────────────

    async fn token(&self) -> Result<String, SheetsError> {
        let token = self
            .auth
            .get_access_token()
            .await
            .map_err(|e| SheetsError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }

    /// Send a request, check status, parse JSON. The body of a non-2xx
    /// response is never read.
    async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SheetsError> {
        let response = request
            .send()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SheetsError::Api {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SheetsError::Transport(e.to_string()))
    }
}

// ── Tests ───────────────────────────────────────────────────────────
