//! Configuration module

use std::env;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_MODEL_PATH: &str = "models/fraud_detection_pipeline.onnx";

/// One ONNX session serves one scoring call at a time
pub const DEFAULT_SCORING_WORKERS: usize = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Path to the ONNX model artifact
    pub model_path: PathBuf,

    /// Path to the feature schema stored alongside the artifact
    pub model_schema_path: PathBuf,

    /// Database pool size
    pub db_max_connections: u32,

    /// Concurrent scoring jobs allowed on the blocking pool. The ONNX
    /// scorer holds a single session, so calls past the first wait on its
    /// lock; raise this only for a `Scorer` that scores in parallel.
    pub scoring_workers: usize,

    /// ONNX Runtime intra-op threads
    pub onnx_threads: usize,

    /// Upper bound applied to history requests
    pub history_max_limit: i64,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));

        let model_schema_path = env::var("MODEL_SCHEMA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| schema_path_for(&model_path));

        Ok(Self {
            database_url,
            port: parse_var("PORT", 8000)?,
            model_path,
            model_schema_path,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,
            scoring_workers: parse_var("SCORING_WORKERS", DEFAULT_SCORING_WORKERS)?,
            onnx_threads: parse_var("ONNX_THREADS", 1)?,
            history_max_limit: parse_var("HISTORY_MAX_LIMIT", 500)?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Database host for logging, with credentials stripped
    pub fn database_host(&self) -> &str {
        self.database_url.rsplit('@').next().unwrap_or("***")
    }
}

/// `models/pipeline.onnx` -> `models/pipeline.schema.json`
pub fn schema_path_for(model_path: &std::path::Path) -> PathBuf {
    model_path.with_extension("schema.json")
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
