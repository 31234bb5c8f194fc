// Application settings
// Loaded from ~/.config/sheetbridge/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// AI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Model identifier (empty = default)
    pub model: String,

    /// Custom endpoint (debugging or regional routing)
    pub endpoint: Option<String>,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            model: String::new(), // Empty = use default model
            endpoint: None,
        }
    }
}

impl AISettings {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.0-flash";
    pub const DEFAULT_ENDPOINT: &'static str = "https://generativelanguage.googleapis.com";

    /// Get the effective model (user-specified or default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            Self::DEFAULT_MODEL
        } else {
            &self.model
        }
    }

    /// Get the effective endpoint
    pub fn effective_endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(Self::DEFAULT_ENDPOINT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Sheets API
    #[serde(rename = "sheets.apiBase")]
    pub sheets_api_base: Option<String>,

    // AI
    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Sheets
            sheets_api_base: None, // None = production endpoint
            // AI
            ai: AISettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetbridge");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file();
            return settings;
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Parse settings file contents, falling back to defaults
    fn parse(contents: &str) -> Self {
        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        match serde_json::from_str(&cleaned) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error parsing settings.json: {}", e);
                eprintln!("Using default settings");
                Self::default()
            }
        }
    }

    /// Create default settings file with comments
    fn create_default_file(&self) {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                eprintln!("Error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Google Sheets API base URL (unset = production)
    // "sheets.apiBase": "http://localhost:9999/v4/spreadsheets",

    // AI (Gemini)
    // API keys are stored in system keychain, not in this file
    "ai": {
        "model": "",
        "endpoint": null
    }
}
"#;

        if let Err(e) = fs::write(&path, default_config) {
            eprintln!("Error writing default settings.json: {}", e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
