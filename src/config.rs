//! Configuration module

use std::env;
use std::path::PathBuf;

use crate::classifier::DevicePreference;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// ONNX weights artifact
    pub model_path: PathBuf,

    /// Class vocabulary resource (one name per line)
    pub vocabulary_path: PathBuf,

    /// SQLite knowledge store
    pub database_path: PathBuf,

    /// Read-only pool size
    pub db_max_connections: u32,

    /// Requested compute device
    pub device: DevicePreference,

    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Largest accepted upload body
    pub max_upload_bytes: usize,

    /// Environment (development, production)
    pub environment: String,

    /// Log output format ("pretty" or "json")
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/convnext_pestopia.onnx"),
            vocabulary_path: PathBuf::from("resources/class_names.txt"),
            database_path: PathBuf::from("knowledge_base.db"),
            db_max_connections: 4,
            device: DevicePreference::Auto,
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 10 * 1024 * 1024,
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let device = match env::var("DEVICE") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown DEVICE value '{}', falling back to auto", raw);
                DevicePreference::Auto
            }),
            Err(_) => defaults.device,
        };

        Self {
            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            vocabulary_path: env::var("VOCABULARY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.vocabulary_path),

            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.db_max_connections),

            device,

            host: env::var("HOST").unwrap_or(defaults.host),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),

            log_format: env::var("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
