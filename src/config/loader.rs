//! Configuration loader with environment variable expansion

use super::{
    expand_env_vars, Config, ConfigError, MetricsConfig, ServerConfig, StorageConfig,
    UploadConfig,
};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from environment variables
    ///
    /// Reads:
    /// - `S3_BUCKET_NAME` (required)
    /// - `AWS_REGION` (default `us-east-1`)
    /// - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` (optional; the AWS
    ///   default provider chain is used when absent)
    /// - `AWS_ENDPOINT_URL` (optional, S3-compatible endpoint)
    /// - `PORT` (default 3000)
    pub fn from_env() -> Result<Config, ConfigError> {
        let bucket = std::env::var("S3_BUCKET_NAME").unwrap_or_default();
        let region = std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let endpoint = std::env::var("AWS_ENDPOINT_URL").ok();

        let port = match std::env::var("PORT") {
            Ok(p) => p.parse::<u16>().map_err(|e| {
                ConfigError::ValidationError(format!("Invalid PORT '{}': {}", p, e))
            })?,
            Err(_) => 3000,
        };

        let config = Config {
            server: ServerConfig {
                address: format!("0.0.0.0:{}", port),
                ..ServerConfig::default()
            },
            storage: StorageConfig {
                bucket,
                region,
                force_path_style: endpoint.is_some(),
                endpoint,
                access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            },
            upload: UploadConfig::default(),
            metrics: MetricsConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }
}
