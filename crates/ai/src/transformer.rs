// The transformation capability workflows depend on.

use async_trait::async_trait;

use crate::credentials::ApiKey;

/// Error from a transformation attempt.
#[derive(Debug, Clone)]
pub enum TransformError {
    /// No usable API key
    MissingKey(String),
    /// Network error
    Network(String),
    /// API error response
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Provider returned unexpected format
    InvalidResponse(String),
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::MissingKey(reason) => write!(f, "{}", reason),
            TransformError::Network(msg) => write!(f, "Network error: {}", msg),
            TransformError::Api { status, message } => {
                write!(f, "API error ({}): {}", status, message)
            }
            TransformError::Parse(msg) => write!(f, "Failed to parse response: {}", msg),
            TransformError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for TransformError {}

/// Capability that rewrites a grid of cell values.
///
/// The output grid is row-major like the input. `instruction` steers the
/// rewrite; without one, implementations apply their default behavior.
#[async_trait]
pub trait ContentTransformer: Send + Sync {
    async fn transform(
        &self,
        values: &[Vec<String>],
        instruction: Option<&str>,
        key: &ApiKey,
    ) -> Result<Vec<Vec<String>>, TransformError>;
}
