use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::schema::{ToolSchema, DEFAULT_CATEGORIES};
use crate::sheets::auth::SPREADSHEETS_SCOPE;
use crate::sheets::google::DEFAULT_API_BASE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sheets: SheetsConfig,
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub worksheets: WorksheetsConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    pub service_account_file: PathBuf,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorksheetsConfig {
    pub tools: String,
    pub prompts: String,
    pub todos: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub categories: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_scopes() -> Vec<String> {
    vec![SPREADSHEETS_SCOPE.to_string()]
}

impl Default for WorksheetsConfig {
    fn default() -> Self {
        Self {
            tools: "collectify_data".to_string(),
            prompts: "ChatGPT Prompts".to_string(),
            todos: "Todo".to_string(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read config file {}. Copy config.example.toml to get started.",
                path.display()
            )
        })?;

        let mut config: Config = toml::from_str(&content)
            .context("Failed to parse config file")?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults for running without a config file against in-memory sheets.
    pub fn offline() -> Self {
        Self {
            sheets: SheetsConfig {
                spreadsheet_id: "offline".to_string(),
                api_base: default_api_base(),
                timeout_secs: default_timeout_secs(),
            },
            credentials: CredentialsConfig {
                service_account_file: PathBuf::from("service-account.json"),
                scopes: default_scopes(),
            },
            worksheets: WorksheetsConfig::default(),
            catalog: CatalogConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Environment variables win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("COLLECTIFY_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = id;
        }
        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            self.credentials.service_account_file = PathBuf::from(path);
        }
    }

    pub fn tool_schema(&self) -> ToolSchema {
        ToolSchema::new(self.catalog.categories.iter().cloned())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.sheets.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_parsing() {
        let toml_str = r#"
            [sheets]
            spreadsheet_id = "1AbC"

            [credentials]
            service_account_file = "service-account.json"

            [worksheets]
            tools = "Tools"
            prompts = "Prompts"
            todos = "Todo"

            [catalog]
            categories = ["Rust", "Python"]

            [retry]
            max_attempts = 2
            base_delay_ms = 100
            max_delay_ms = 1000

            [logging]
            level = "debug"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sheets.spreadsheet_id, "1AbC");
        assert_eq!(config.sheets.api_base, DEFAULT_API_BASE);
        assert_eq!(config.credentials.scopes, vec![SPREADSHEETS_SCOPE]);
        assert_eq!(config.worksheets.tools, "Tools");
        assert!(config.tool_schema().is_known_category("rust"));
        assert!(!config.tool_schema().is_known_category("Django"));
        assert_eq!(config.retry_policy().max_attempts, 2);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(100));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let toml_str = r#"
            [sheets]
            spreadsheet_id = "1AbC"

            [credentials]
            service_account_file = "sa.json"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.worksheets.prompts, "ChatGPT Prompts");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.tool_schema().is_known_category("Frontend Tools"));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[sheets]\nspreadsheet_id = \"file-id\"\n\n[credentials]\nservice_account_file = \"sa.json\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(!config.sheets.spreadsheet_id.is_empty());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = Config::from_file("/nonexistent/collectify.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
