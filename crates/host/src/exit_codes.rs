//! Host exit code registry.
//!
//! This is the single source of truth for all exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 10-13   | Upstream         | Auth, API, transport, config             |
//! | 14      | Local            | Local I/O (stdin/stdout, files)          |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, unparsable values.
pub const EXIT_USAGE: u8 = 2;

/// Not authenticated, or token storage failed.
pub const EXIT_AUTH: u8 = 10;

/// Upstream API rejected the request (non-2xx status).
pub const EXIT_API: u8 = 11;

/// Network failure or undecodable response.
pub const EXIT_TRANSPORT: u8 = 12;

/// Configuration error (keychain, settings file).
pub const EXIT_CONFIG: u8 = 13;

/// Local I/O error (framing, file reads).
pub const EXIT_IO: u8 = 14;
