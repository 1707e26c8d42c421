//! Configuration management for Lambda functions.

use std::env;

pub const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/files";
pub const DEFAULT_INTERNAL_API_BASE: &str = "http://127.0.0.1:8000";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Full connection string; takes precedence over the secret lookup
    pub database_url: Option<String>,
    /// Database host
    pub db_host: Option<String>,
    /// Database name
    pub db_name: String,
    /// ARN of the secret containing database credentials
    pub db_secret_arn: Option<String>,
    /// AWS region
    pub aws_region: String,
    /// Base URL of the Drive v3 files endpoint
    pub drive_api_base: String,
    /// Base URL of this application's own API (transcript ingestion)
    pub internal_api_base: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            database_url: non_empty("DATABASE_URL"),
            db_host: non_empty("DB_HOST"),
            db_name: non_empty("DB_NAME").unwrap_or_else(|| "summariser".to_string()),
            db_secret_arn: non_empty("DB_SECRET_ARN"),
            aws_region: non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            drive_api_base: non_empty("GOOGLE_DRIVE_API_BASE")
                .unwrap_or_else(|| DEFAULT_DRIVE_API_BASE.to_string()),
            internal_api_base: non_empty("INTERNAL_API_BASE")
                .unwrap_or_else(|| DEFAULT_INTERNAL_API_BASE.to_string()),
        }
    }
}
