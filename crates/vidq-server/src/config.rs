//! Configuration system for the vidq server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, translator, storage, logging)
//! 2. .env file - secrets (API keys)
//!
//! Environment variables always override config.yaml values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use vidq_nl::Strategy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Translator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Strategy: "rules" or "llm"
    pub strategy: String,

    /// Completion model (llm strategy only)
    pub model: String,

    /// Alternative OpenAI-compatible endpoint
    pub api_base: Option<String>,

    pub timeout_secs: u64,

    /// Rule strategy: answer unmatched questions with a total video count
    pub fallback: bool,

    /// YAML schema descriptor replacing the built-in vocabulary
    pub schema_path: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            strategy: "rules".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            timeout_secs: 30,
            fallback: true,
            schema_path: None,
        }
    }
}

impl TranslatorConfig {
    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        self.strategy.parse().map_err(ConfigError::Invalid)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// DuckDB file, or ":memory:"
    pub database: String,

    /// Dataset JSON loaded at startup
    pub seed_path: Option<String>,

    pub query_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "./data/videos.duckdb".to_string(),
            seed_path: None,
            query_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    pub fn in_memory(&self) -> bool {
        self.database == ":memory:"
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("VIDQ_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("VIDQ_SERVER_PORT") {
            if let Ok(port_num) = port.parse() {
                self.server.port = port_num;
            }
        }

        if let Ok(strategy) = std::env::var("VIDQ_TRANSLATOR") {
            self.translator.strategy = strategy;
        }
        if let Ok(model) = std::env::var("VIDQ_MODEL") {
            self.translator.model = model;
        }
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            self.translator.api_base = Some(base);
        }

        if let Ok(database) = std::env::var("VIDQ_DATABASE") {
            self.storage.database = database;
        }
        if let Ok(seed) = std::env::var("VIDQ_SEED_PATH") {
            self.storage.seed_path = Some(seed);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Get OpenAI API key from environment (must be in .env)
    pub fn get_openai_api_key() -> Result<String, ConfigError> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}
