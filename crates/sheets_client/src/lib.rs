//! Google Sheets API client — shared between the workflows and the host CLI.
//!
//! This crate is the single source of truth for the Sheets wire contract:
//! token sourcing, metadata, range reads, appends, updates.
//!
//! No retries. No caching. A failed operation reports exactly one error,
//! rendered with the historic wording the extension displays verbatim.

mod auth;
mod client;

pub use auth::{
    delete_token, load_token, save_token, token_file_path, AccessToken, AuthError,
    StaticTokenProvider, StoredToken, StoredTokenProvider, TokenProvider, TOKEN_ENV_VAR,
};
pub use client::{
    AppendResult, RangeData, SheetEntry, SheetProperties, SheetsClient, SheetsError,
    SpreadsheetMetadata, SpreadsheetProperties, UpdateCounts, UpdateResult,
};
