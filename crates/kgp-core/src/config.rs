//! KGP Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with sensible defaults for local development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Graph database connection
    pub database: DatabaseConfig,

    /// Extraction model configuration
    pub extraction: ExtractionConfig,

    /// Artifact storage
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // SurrealDB
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            self.database.surrealdb_url = url;
        }
        if let Ok(user) = std::env::var("SURREALDB_USER") {
            self.database.surrealdb_user = user;
        }
        if let Ok(pass) = std::env::var("SURREALDB_PASS") {
            self.database.surrealdb_pass = pass;
        }
        if let Ok(ns) = std::env::var("SURREALDB_NAMESPACE") {
            self.database.surrealdb_namespace = ns;
        }
        if let Ok(db) = std::env::var("SURREALDB_DATABASE") {
            self.database.surrealdb_database = db;
        }

        // Extraction
        if let Ok(backend) = std::env::var("EXTRACTION_BACKEND") {
            self.extraction.backend = backend.parse()?;
        }
        if let Ok(endpoint) = std::env::var("EXTRACTION_ENDPOINT") {
            self.extraction.endpoint = endpoint;
        }
        if let Ok(beams) = std::env::var("NUM_BEAMS") {
            self.extraction.num_beams = parse_env("NUM_BEAMS", beams)?;
        }
        if let Ok(n) = std::env::var("NUM_RETURN_SEQUENCES") {
            self.extraction.num_return_sequences = parse_env("NUM_RETURN_SEQUENCES", n)?;
        }

        // Storage
        if let Ok(root) = std::env::var("ARTIFACT_ROOT") {
            self.storage.root = PathBuf::from(root);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            self.logging.json_format = parse_env("LOG_JSON", json)?;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Graph database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SurrealDB WebSocket URL
    pub surrealdb_url: String,

    /// SurrealDB username
    pub surrealdb_user: String,

    /// SurrealDB password
    pub surrealdb_pass: String,

    /// SurrealDB namespace
    pub surrealdb_namespace: String,

    /// SurrealDB database name
    pub surrealdb_database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            surrealdb_url: "ws://localhost:8000".to_string(),
            surrealdb_user: "root".to_string(),
            surrealdb_pass: "root".to_string(),
            surrealdb_namespace: "kgp".to_string(),
            surrealdb_database: "knowledge".to_string(),
        }
    }
}

/// Extraction model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Which model family to call
    pub backend: BackendKind,

    /// Base URL of the model service
    pub endpoint: String,

    /// Candidate spans per text for span models
    pub top_k: usize,

    /// Beam width for sequence models
    pub num_beams: usize,

    /// Sequences returned per input for sequence models
    pub num_return_sequences: usize,

    /// Maximum generated sequence length
    pub max_length: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Spans,
            endpoint: "http://localhost:9000".to_string(),
            top_k: 3,
            num_beams: 5,
            num_return_sequences: 5,
            max_length: 256,
            timeout_secs: 120,
        }
    }
}

/// Supported extraction model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendKind {
    /// Predicts typed spans and scored triplets directly
    Spans,
    /// Generates tagged sequences that need decoding
    Sequences,
}

impl BackendKind {
    /// Method name used on the command line and in artifact file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spans => "relik",
            Self::Sequences => "mrebel",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relik" | "spans" => Ok(Self::Spans),
            "mrebel" | "rebel" | "sequences" => Ok(Self::Sequences),
            _ => Err(ConfigError::InvalidValue {
                key: "EXTRACTION_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendKind> for String {
    fn from(kind: BackendKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the logical artifact paths are resolved against
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.extraction.num_beams, 5);
        assert_eq!(config.extraction.num_return_sequences, 5);
        assert_eq!(config.extraction.backend, BackendKind::Spans);
        assert_eq!(config.database.surrealdb_namespace, "kgp");
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("relik".parse::<BackendKind>().unwrap(), BackendKind::Spans);
        assert_eq!(
            "mREBEL".parse::<BackendKind>().unwrap(),
            BackendKind::Sequences
        );
        assert!("gliner".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kgp.toml");
        std::fs::write(
            &path,
            r#"
            [extraction]
            backend = "mrebel"
            num_beams = 3

            [storage]
            root = "/data"
            "#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.extraction.backend, BackendKind::Sequences);
        assert_eq!(config.extraction.num_beams, 3);
        assert_eq!(config.extraction.num_return_sequences, 5);
        assert_eq!(config.storage.root, PathBuf::from("/data"));
    }

    #[test]
    fn test_unknown_backend_in_toml_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kgp.toml");
        std::fs::write(&path, "[extraction]\nbackend = \"unknown\"\n").unwrap();

        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
