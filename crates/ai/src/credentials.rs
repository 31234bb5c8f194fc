// Key sourcing for transformation runs
//
// Two sources exist: the ambient configuration (keychain/environment,
// used by refine-answers) and a caller-supplied key (generate-feedback).
// Both produce the same ApiKey so the transform path is identical.

use sheetbridge_config::ai::{env_var_name, get_api_key, GEMINI_PROVIDER};

use crate::transformer::TransformError;

/// A resolved API key.
#[derive(Debug, Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Capability that produces the API key for one workflow run.
pub trait ApiKeySource: Send + Sync {
    fn api_key(&self) -> Result<ApiKey, TransformError>;
}

/// Key from the ambient configuration (keychain first, then environment).
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientKey;

impl ApiKeySource for AmbientKey {
    fn api_key(&self) -> Result<ApiKey, TransformError> {
        let lookup = get_api_key(GEMINI_PROVIDER);
        match lookup.key {
            Some(key) => Ok(ApiKey::new(key)),
            None => Err(TransformError::MissingKey(format!(
                "No API key found. Set via keychain or {}",
                env_var_name(GEMINI_PROVIDER)
            ))),
        }
    }
}

/// Key supplied by the caller for a single run. Never persisted.
#[derive(Debug, Clone)]
pub struct SuppliedKey(String);

impl SuppliedKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl ApiKeySource for SuppliedKey {
    fn api_key(&self) -> Result<ApiKey, TransformError> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Err(TransformError::MissingKey(
                "Provided API key is empty".to_string(),
            ));
        }
        Ok(ApiKey::new(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_key_passes_through() {
        let key = SuppliedKey::new("AIza-test").api_key().unwrap();
        assert_eq!(key.as_str(), "AIza-test");
    }

    #[test]
    fn test_supplied_key_trims_whitespace() {
        let key = SuppliedKey::new("  AIza-test \n").api_key().unwrap();
        assert_eq!(key.as_str(), "AIza-test");
    }

    #[test]
    fn test_supplied_key_rejects_empty() {
        for raw in ["", "   ", "\n\t"] {
            let err = SuppliedKey::new(raw).api_key().unwrap_err();
            assert_eq!(err.to_string(), "Provided API key is empty");
        }
    }

    #[test]
    fn test_ambient_key_reads_environment() {
        std::env::set_var("SHEETBRIDGE_GEMINI_KEY", "env-key-123");

        let key = AmbientKey.api_key().unwrap();
        assert_eq!(key.as_str(), "env-key-123");

        std::env::remove_var("SHEETBRIDGE_GEMINI_KEY");
    }
}
