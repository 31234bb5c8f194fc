// SheetBridge native messaging host - extension backend and CLI
// Serve mode speaks Chrome's native messaging protocol on stdin/stdout;
// the other commands exist for scripts and debugging.

mod exit_codes;
mod framing;
mod router;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sheetbridge_ai::GeminiTransformer;
use sheetbridge_config::ai::{self, AIDiagnostics, ResolvedAIConfig, GEMINI_PROVIDER};
use sheetbridge_config::settings::Settings;
use sheetbridge_protocol::PROTOCOL_VERSION;
use sheetbridge_sheets_client::{
    delete_token, load_token, save_token, token_file_path, SheetsClient, SheetsError, StoredToken,
    StoredTokenProvider, TOKEN_ENV_VAR,
};
use sheetbridge_workflow::Orchestrator;

use exit_codes::{
    EXIT_API, EXIT_AUTH, EXIT_CONFIG, EXIT_IO, EXIT_SUCCESS, EXIT_TRANSPORT, EXIT_USAGE,
};
use router::MessageRouter;

#[derive(Parser)]
#[command(name = "sheetbridge-host")]
#[command(about = "Native messaging host for the SheetBridge extension")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the native messaging loop on stdin/stdout
    ///
    /// Chrome starts the host in this mode; run it by hand only for
    /// debugging, with framed messages on stdin.
    Serve,

    /// Handle one message and print the response
    #[command(after_help = "\
Examples:
  sheetbridge-host send message.json
  echo '{\"type\":\"NOT_A_THING\"}' | sheetbridge-host send")]
    Send {
        /// Message file (omit to read from stdin)
        file: Option<PathBuf>,
    },

    /// Direct Google Sheets operations
    Sheets {
        #[command(subcommand)]
        command: SheetsCommands,
    },

    /// Google Sheets token management
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Gemini API key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Show configuration and credential status
    Diag,
}

#[derive(Subcommand)]
enum SheetsCommands {
    /// Fetch spreadsheet metadata
    Metadata {
        spreadsheet_id: String,
    },

    /// Read a range of values
    Read {
        spreadsheet_id: String,
        range: String,
    },

    /// Append rows after the table in a range
    #[command(after_help = "\
Examples:
  sheetbridge-host sheets append SHEET_ID 'Sheet1!A:B' '[[\"a\",\"1\"],[\"b\",\"2\"]]'")]
    Append {
        spreadsheet_id: String,
        range: String,
        /// Rows as a JSON array of arrays of strings
        values: String,
    },

    /// Overwrite a range of values
    #[command(after_help = "\
Examples:
  sheetbridge-host sheets update SHEET_ID 'Sheet1!A1:B2' '[[\"a\",\"1\"],[\"b\",\"2\"]]'")]
    Update {
        spreadsheet_id: String,
        range: String,
        /// Rows as a JSON array of arrays of strings
        values: String,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Save a Sheets access token (reads one line from stdin if omitted)
    SetToken {
        token: Option<String>,

        /// Account label for display
        #[arg(long)]
        account: Option<String>,
    },

    /// Report whether a token is available
    Status,

    /// Delete the saved token
    Logout,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store the Gemini API key in the system keychain (reads one line from stdin if omitted)
    Set {
        key: Option<String>,
    },

    /// Report where the key resolves from (never prints the key)
    Show,

    /// Remove the key from the system keychain
    Clear,
}

/// stdout carries protocol frames in serve mode, so logging goes to
/// stderr (env_logger's default).
fn init_logging() {
    let filter = std::env::var("SHEETBRIDGE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "warn".to_string());
    env_logger::Builder::new().parse_filters(&filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    // Chrome launches the host with the extension origin as the first
    // argument (and extra flags on Windows). Route that straight into
    // serve mode instead of arg parsing.
    let browser_launched = std::env::args()
        .nth(1)
        .map(|arg| arg.starts_with("chrome-extension://"))
        .unwrap_or(false);

    let result = if browser_launched {
        cmd_serve().await
    } else {
        match Cli::parse().command {
            None => {
                eprintln!("Usage: sheetbridge-host <command> [options]");
                eprintln!("       sheetbridge-host --help for more information");
                Ok(())
            }
            Some(Commands::Serve) => cmd_serve().await,
            Some(Commands::Send { file }) => cmd_send(file).await,
            Some(Commands::Sheets { command }) => match command {
                SheetsCommands::Metadata { spreadsheet_id } => {
                    cmd_sheets_metadata(&spreadsheet_id).await
                }
                SheetsCommands::Read { spreadsheet_id, range } => {
                    cmd_sheets_read(&spreadsheet_id, &range).await
                }
                SheetsCommands::Append { spreadsheet_id, range, values } => {
                    cmd_sheets_append(&spreadsheet_id, &range, &values).await
                }
                SheetsCommands::Update { spreadsheet_id, range, values } => {
                    cmd_sheets_update(&spreadsheet_id, &range, &values).await
                }
            },
            Some(Commands::Auth { command }) => match command {
                AuthCommands::SetToken { token, account } => cmd_auth_set_token(token, account),
                AuthCommands::Status => cmd_auth_status(),
                AuthCommands::Logout => cmd_auth_logout(),
            },
            Some(Commands::Key { command }) => match command {
                KeyCommands::Set { key } => cmd_key_set(key),
                KeyCommands::Show => cmd_key_show(),
                KeyCommands::Clear => cmd_key_clear(),
            },
            Some(Commands::Diag) => cmd_diag(),
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    fn auth(msg: impl Into<String>) -> Self {
        Self { code: EXIT_AUTH, message: msg.into(), hint: None }
    }

    fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    /// Create an error from a Sheets client error with the matching exit code.
    fn sheets(err: SheetsError) -> Self {
        let code = match &err {
            SheetsError::Auth(_) => EXIT_AUTH,
            SheetsError::Api { .. } => EXIT_API,
            SheetsError::Transport(_) => EXIT_TRANSPORT,
        };
        Self { code, message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// shared construction
// ============================================================================

fn build_sheets_client(settings: &Settings) -> SheetsClient {
    let auth = Arc::new(StoredTokenProvider);
    match &settings.sheets_api_base {
        Some(base) => SheetsClient::with_base_url(auth, base.clone()),
        None => SheetsClient::new(auth),
    }
}

fn build_router(settings: &Settings) -> MessageRouter {
    let config = ResolvedAIConfig::from_settings(&settings.ai);
    let transformer = GeminiTransformer::with_base_url(config.model, config.endpoint);
    let orchestrator = Orchestrator::new(build_sheets_client(settings), Arc::new(transformer));
    MessageRouter::new(orchestrator)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn parse_values(raw: &str) -> Result<Vec<Vec<String>>, CliError> {
    serde_json::from_str(raw).map_err(|e| {
        CliError::args(format!("values must be a JSON array of arrays of strings: {}", e))
            .with_hint(r#"example: '[["a","b"],["c","d"]]'"#)
    })
}

fn read_secret_line(prompt: &str) -> Result<String, CliError> {
    use std::io::Write;
    eprint!("{}", prompt);
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| CliError::io(format!("failed to read stdin: {}", e)))?;
    Ok(line)
}

// ============================================================================
// serve / send
// ============================================================================

async fn cmd_serve() -> Result<(), CliError> {
    let settings = Settings::load();
    let router = build_router(&settings);

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();

    log::info!("native messaging loop started");
    loop {
        let frame = match framing::read_frame(&mut stdin).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("extension disconnected");
                return Ok(());
            }
            Err(e) => return Err(CliError::io(format!("reading frame: {}", e))),
        };

        let response = router.handle_bytes(&frame).await;
        let bytes = serde_json::to_vec(&response)
            .map_err(|e| CliError::io(format!("encoding response: {}", e)))?;
        framing::write_frame(&mut stdout, &bytes)
            .await
            .map_err(|e| CliError::io(format!("writing frame: {}", e)))?;
    }
}

async fn cmd_send(file: Option<PathBuf>) -> Result<(), CliError> {
    let bytes = match file {
        Some(path) => std::fs::read(&path)
            .map_err(|e| CliError::io(format!("failed to read {}: {}", path.display(), e)))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut buf)
                .map_err(|e| CliError::io(format!("failed to read stdin: {}", e)))?;
            buf
        }
    };

    let settings = Settings::load();
    let router = build_router(&settings);
    let response = router.handle_bytes(&bytes).await;

    print_json(&response)
}

// ============================================================================
// sheets
// ============================================================================

async fn cmd_sheets_metadata(spreadsheet_id: &str) -> Result<(), CliError> {
    let settings = Settings::load();
    let client = build_sheets_client(&settings);
    let metadata = client
        .get_metadata(spreadsheet_id)
        .await
        .map_err(CliError::sheets)?;
    print_json(&metadata)
}

async fn cmd_sheets_read(spreadsheet_id: &str, range: &str) -> Result<(), CliError> {
    let settings = Settings::load();
    let client = build_sheets_client(&settings);
    let data = client
        .read_range(spreadsheet_id, range)
        .await
        .map_err(CliError::sheets)?;
    print_json(&data)
}

async fn cmd_sheets_append(spreadsheet_id: &str, range: &str, values: &str) -> Result<(), CliError> {
    let values = parse_values(values)?;
    let settings = Settings::load();
    let client = build_sheets_client(&settings);
    let result = client
        .append_rows(spreadsheet_id, range, &values)
        .await
        .map_err(CliError::sheets)?;
    print_json(&result)
}

async fn cmd_sheets_update(spreadsheet_id: &str, range: &str, values: &str) -> Result<(), CliError> {
    let values = parse_values(values)?;
    let settings = Settings::load();
    let client = build_sheets_client(&settings);
    let result = client
        .update_range(spreadsheet_id, range, &values)
        .await
        .map_err(CliError::sheets)?;
    print_json(&result)
}

// ============================================================================
// auth
// ============================================================================

fn cmd_auth_set_token(token: Option<String>, account: Option<String>) -> Result<(), CliError> {
    let token = match token {
        Some(token) => token,
        None => read_secret_line("Paste the access token: ")?,
    };
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CliError::args("token cannot be empty"));
    }

    let stored = StoredToken { token, account };
    save_token(&stored).map_err(CliError::auth)?;

    match token_file_path() {
        Some(path) => println!("Token saved to {}", path.display()),
        None => println!("Token saved"),
    }
    Ok(())
}

fn cmd_auth_status() -> Result<(), CliError> {
    let env_set = std::env::var(TOKEN_ENV_VAR)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    if env_set {
        println!("Authenticated via {} (environment)", TOKEN_ENV_VAR);
        return Ok(());
    }

    match load_token() {
        Some(stored) => {
            match stored.account {
                Some(account) => println!("Authenticated as {} (token file)", account),
                None => println!("Authenticated (token file)"),
            }
            Ok(())
        }
        None => Err(CliError::auth("not authenticated")
            .with_hint("run `sheetbridge-host auth set-token` first")),
    }
}

fn cmd_auth_logout() -> Result<(), CliError> {
    delete_token().map_err(CliError::auth)?;
    println!("Token deleted");
    Ok(())
}

// ============================================================================
// key
// ============================================================================

fn cmd_key_set(key: Option<String>) -> Result<(), CliError> {
    let key = match key {
        Some(key) => key,
        None => read_secret_line("Paste the Gemini API key: ")?,
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::args("key cannot be empty"));
    }

    ai::set_api_key(GEMINI_PROVIDER, key).map_err(CliError::config)?;
    println!("Key stored in system keychain");
    Ok(())
}

fn cmd_key_show() -> Result<(), CliError> {
    let lookup = ai::get_api_key(GEMINI_PROVIDER);
    match lookup.key {
        Some(_) => {
            println!("Key present (source: {})", lookup.source.as_str());
            Ok(())
        }
        None => Err(CliError::config("no key found").with_hint(format!(
            "run `sheetbridge-host key set` or set {}",
            ai::env_var_name(GEMINI_PROVIDER)
        ))),
    }
}

fn cmd_key_clear() -> Result<(), CliError> {
    ai::delete_api_key(GEMINI_PROVIDER).map_err(CliError::config)?;
    println!("Key removed from system keychain");
    Ok(())
}

// ============================================================================
// diag
// ============================================================================

fn cmd_diag() -> Result<(), CliError> {
    let settings = Settings::load();
    let diagnostics = AIDiagnostics::from_settings(&settings.ai);
    print!("{}", diagnostics);

    println!();
    println!("Google Sheets");
    println!("──────────────────────────────");
    let env_token = std::env::var(TOKEN_ENV_VAR)
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let token_status = if env_token {
        "environment"
    } else if load_token().is_some() {
        "token file"
    } else {
        "missing"
    };
    println!("Token:             {}", token_status);
    match &settings.sheets_api_base {
        Some(base) => println!("API base:          {}", base),
        None => println!("API base:          (production)"),
    }

    println!();
    println!("Protocol version:  {}", PROTOCOL_VERSION);
    println!("Settings file:     {}", Settings::config_path_display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        let values = parse_values(r#"[["a","b"],["c","d"]]"#).unwrap();
        assert_eq!(values, vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
        ]);
    }

    #[test]
    fn test_parse_values_rejects_non_grid() {
        let err = parse_values(r#"{"values": []}"#).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.message.contains("JSON array of arrays"), "message: {}", err.message);
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_sheets_error_exit_codes() {
        let auth = CliError::sheets(SheetsError::Auth("no token".into()));
        assert_eq!(auth.code, EXIT_AUTH);
        assert_eq!(auth.message, "Authentication failed: no token");

        let api = CliError::sheets(SheetsError::Api {
            status: 404,
            status_text: "Not Found".into(),
        });
        assert_eq!(api.code, EXIT_API);
        assert_eq!(api.message, "API request failed: 404 Not Found");

        let transport = CliError::sheets(SheetsError::Transport("connection refused".into()));
        assert_eq!(transport.code, EXIT_TRANSPORT);
        assert_eq!(transport.message, "Request failed: connection refused");
    }
}
