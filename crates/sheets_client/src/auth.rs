//! Token storage and sourcing.
//!
//! Reads/writes ~/.config/sheetbridge/google_token.json (0600 on Unix).
//! The `TokenProvider` trait is the seam between workflows and whatever
//! supplies credentials; implementations may cache or refresh, but a
//! failed acquisition is final for that operation.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Environment override for the stored token (CI/headless).
pub const TOKEN_ENV_VAR: &str = "SHEETBRIDGE_SHEETS_TOKEN";

/// Opaque bearer token. Operations attach it; nothing inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error type for token acquisition.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No token configured anywhere
    NotAuthenticated,
    /// Token storage could not be read or written
    Storage(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::NotAuthenticated => {
                write!(f, "Not authenticated — run `sheetbridge-host auth set-token` first")
            }
            AuthError::Storage(msg) => write!(f, "Token storage error: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Capability that produces a bearer token for the Sheets API.
///
/// One acquisition per operation; the client never retries a failure.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Produce a token, or the terminal reason none is available.
    async fn get_access_token(&self) -> Result<AccessToken, AuthError>;

    /// Drop any stored token material.
    async fn revoke_token(&self) -> Result<(), AuthError>;

    /// True if a token is currently available without user action.
    async fn is_authenticated(&self) -> bool;
}

// ── Stored token file ──────────────────────────────────────────────────────

/// Token material stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    /// Bearer token for the Sheets API
    pub token: String,
    /// Account label (for display)
    #[serde(default)]
    pub account: Option<String>,
}

impl StoredToken {
    pub fn new(token: String) -> Self {
        Self { token, account: None }
    }
}

/// Returns the path to the token file.
pub fn token_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("sheetbridge/google_token.json"))
}

/// Load the saved token from disk.
/// Returns None if no token is saved or if the file is invalid.
pub fn load_token() -> Option<StoredToken> {
    let path = token_file_path()?;
    let contents = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save the token to disk.
/// Creates the parent directory if it doesn't exist.
/// Sets 0600 permissions on Unix.
pub fn save_token(stored: &StoredToken) -> Result<(), String> {
    let path = token_file_path().ok_or("Could not determine config directory")?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(stored)
        .map_err(|e| format!("Failed to serialize token: {}", e))?;

    std::fs::write(&path, &contents)
        .map_err(|e| format!("Failed to write token file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    Ok(())
}

/// Delete the saved token.
pub fn delete_token() -> Result<(), String> {
    let Some(path) = token_file_path() else {
        return Ok(());
    };
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| format!("Failed to delete token file: {}", e))?;
    }
    Ok(())
}

// ── Providers ──────────────────────────────────────────────────────────────

/// Resolves the token from `SHEETBRIDGE_SHEETS_TOKEN`, then the token file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredTokenProvider;

fn env_token() -> Option<String> {
    let value = std::env::var(TOKEN_ENV_VAR).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = env_token() {
            return Ok(AccessToken::new(token));
        }
        load_token()
            .map(|stored| AccessToken::new(stored.token))
            .ok_or(AuthError::NotAuthenticated)
    }

    async fn revoke_token(&self) -> Result<(), AuthError> {
        delete_token().map_err(AuthError::Storage)
    }

    async fn is_authenticated(&self) -> bool {
        env_token().is_some() || load_token().is_some()
    }
}

/// Fixed-token provider for embedding and tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_access_token(&self) -> Result<AccessToken, AuthError> {
        Ok(AccessToken::new(self.token.clone()))
    }

    async fn revoke_token(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        true
    }
}
