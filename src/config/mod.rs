//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services; AWS is used when absent
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Which blob store holds the master table and roster snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    S3(S3Settings),
    /// Directory on local disk, keys map to relative paths
    Local(PathBuf),
    /// Process memory, lost on restart
    Memory,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub store: StoreBackend,
    /// Blob key of the master table
    pub data_file: String,
    /// Divisor `d` of the special-needs quota `max(1, required / d)`
    pub special_quota_divisor: usize,
}

/// Invalid or incomplete configuration.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_psk = var("MISDINAR_API_PSK");

        let bind_addr = var("MISDINAR_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| ConfigError(format!("invalid MISDINAR_BIND_ADDR: {}", e)))?;

        let log_level = var("MISDINAR_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let data_file = var("MISDINAR_DATA_FILE").unwrap_or_else(|| "data.csv".to_string());

        let special_quota_divisor = match var("MISDINAR_SPECIAL_QUOTA_DIVISOR") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    ConfigError(format!(
                        "MISDINAR_SPECIAL_QUOTA_DIVISOR must be a positive integer, got {:?}",
                        raw
                    ))
                })?,
            None => 4,
        };

        let backend = var("MISDINAR_STORE").unwrap_or_else(|| "local".to_string());
        let store = match backend.to_ascii_lowercase().as_str() {
            "s3" => {
                let required = |name: &str| {
                    var(name).ok_or_else(|| {
                        ConfigError(format!("{} is required for the s3 store", name))
                    })
                };
                StoreBackend::S3(S3Settings {
                    bucket: required("MISDINAR_S3_BUCKET")?,
                    region: var("MISDINAR_S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                    endpoint: var("MISDINAR_S3_ENDPOINT"),
                    access_key_id: required("MISDINAR_S3_ACCESS_KEY_ID")?,
                    secret_access_key: required("MISDINAR_S3_SECRET_ACCESS_KEY")?,
                })
            }
            "local" => StoreBackend::Local(
                var("MISDINAR_DATA_DIR")
                    .unwrap_or_else(|| "./data".to_string())
                    .into(),
            ),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError(format!(
                    "unknown MISDINAR_STORE {:?} (expected s3, local or memory)",
                    other
                )))
            }
        };

        Ok(Self {
            api_psk,
            bind_addr,
            log_level,
            store,
            data_file,
            special_quota_divisor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.data_file, "data.csv");
        assert_eq!(config.special_quota_divisor, 4);
        assert_eq!(config.store, StoreBackend::Local(PathBuf::from("./data")));
    }

    #[test]
    fn test_s3_config() {
        let config = config_from(&[
            ("MISDINAR_STORE", "S3"),
            ("MISDINAR_S3_BUCKET", "parish"),
            ("MISDINAR_S3_REGION", "ap-southeast-3"),
            ("MISDINAR_S3_ACCESS_KEY_ID", "AKIA"),
            ("MISDINAR_S3_SECRET_ACCESS_KEY", "secret"),
        ])
        .unwrap();

        match config.store {
            StoreBackend::S3(settings) => {
                assert_eq!(settings.bucket, "parish");
                assert_eq!(settings.region, "ap-southeast-3");
                assert!(settings.endpoint.is_none());
            }
            other => panic!("expected s3 backend, got {:?}", other),
        }
    }

    #[test]
    fn test_s3_config_requires_credentials() {
        let err = config_from(&[("MISDINAR_STORE", "s3"), ("MISDINAR_S3_BUCKET", "parish")])
            .unwrap_err();
        assert!(err.0.contains("MISDINAR_S3_ACCESS_KEY_ID"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("MISDINAR_STORE", "postgres")]).is_err());
        assert!(config_from(&[("MISDINAR_BIND_ADDR", "not-an-address")]).is_err());
        assert!(config_from(&[("MISDINAR_SPECIAL_QUOTA_DIVISOR", "0")]).is_err());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("MISDINAR_API_PSK", "  "), ("MISDINAR_STORE", "memory")])
            .unwrap();
        assert!(config.api_psk.is_none());
        assert_eq!(config.store, StoreBackend::Memory);
    }
}
