//! Process configuration from environment variables (and an optional `.env`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use scribe_infra::storage::{S3Settings, StorageSettings};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Prefix all routes are nested under; empty means none.
    pub root_path: String,
    pub consul_host: String,
    pub consul_port: u16,
    pub redis_url: Option<String>,
    /// `STORAGE_BACKEND`: `s3` (default) or `local`.
    pub storage: StorageSettings,
    pub transcriber_url: String,
    pub transcribe_timeout: Duration,
    pub notify_timeout: Duration,
    pub job_retention: Duration,
    pub sweep_interval: Duration,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source. Missing or empty values take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let string = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            host: string("APP_HOST", "0.0.0.0"),
            port: parse(&var, "APP_PORT", "port number", 8000)?,
            root_path: normalize_root_path(&string("ROOT_PATH", "")),
            consul_host: string("CONSUL_HOST", "localhost"),
            consul_port: parse(&var, "CONSUL_PORT", "port number", 8500)?,
            redis_url: var("REDIS_URL"),
            storage: storage(&var)?,
            transcriber_url: string("TRANSCRIBER_URL", "http://127.0.0.1:5000"),
            transcribe_timeout: secs(&var, "TRANSCRIBE_TIMEOUT_SECS", 600)?,
            notify_timeout: secs(&var, "NOTIFY_TIMEOUT_SECS", 10)?,
            job_retention: secs(&var, "JOB_RETENTION_SECS", 24 * 60 * 60)?,
            sweep_interval: positive_secs(&var, "SWEEP_INTERVAL_SECS", 60 * 60)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn storage(var: &impl Fn(&str) -> Option<String>) -> Result<StorageSettings, ConfigError> {
    let backend = var("STORAGE_BACKEND").unwrap_or_else(|| "s3".to_string());
    match backend.trim().to_ascii_lowercase().as_str() {
        "local" => Ok(StorageSettings::Local {
            root: PathBuf::from(var("OBJECT_STORE_ROOT").unwrap_or_else(|| "./data".to_string())),
        }),
        "s3" => Ok(StorageSettings::S3(S3Settings {
            region: var("AWS_REGION").unwrap_or_else(|| S3Settings::default().region),
            endpoint: var("S3_ENDPOINT"),
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            session_token: var("AWS_SESSION_TOKEN"),
            request_timeout: secs(var, "S3_TIMEOUT_SECS", 60)?,
        })),
        _ => Err(ConfigError::Invalid {
            name: "STORAGE_BACKEND",
            expected: "storage backend (s3 or local)",
            value: backend,
        }),
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

fn secs(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    parse(var, name, "number of seconds", default).map(Duration::from_secs)
}

/// Like `secs`, but zero is rejected.
fn positive_secs(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let value = secs(var, name, default)?;
    if value.is_zero() {
        return Err(ConfigError::Invalid {
            name,
            expected: "positive number of seconds",
            value: var(name).unwrap_or_default(),
        });
    }
    Ok(value)
}

/// `api/v1/` → `/api/v1`; `/` and empty → empty.
fn normalize_root_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.root_path, "");
        assert_eq!(config.consul_port, 8500);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.job_retention, Duration::from_secs(86_400));
        assert_eq!(config.sweep_interval, Duration::from_secs(3_600));
        assert_eq!(config.notify_timeout, Duration::from_secs(10));
        assert_eq!(config.storage, StorageSettings::S3(S3Settings::default()));
    }

    #[test]
    fn s3_settings_come_from_aws_variables() {
        let config = from_pairs(&[
            ("S3_ENDPOINT", "http://minio:9000"),
            ("AWS_ACCESS_KEY_ID", "minio"),
            ("AWS_SECRET_ACCESS_KEY", "minio123"),
            ("AWS_REGION", "eu-west-1"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageSettings::S3(S3Settings {
                region: "eu-west-1".into(),
                endpoint: Some("http://minio:9000".into()),
                access_key_id: Some("minio".into()),
                secret_access_key: Some("minio123".into()),
                session_token: None,
                request_timeout: Duration::from_secs(60),
            })
        );
    }

    #[test]
    fn local_backend_uses_object_store_root() {
        let config = from_pairs(&[("STORAGE_BACKEND", "Local"), ("OBJECT_STORE_ROOT", "/srv/objects")])
            .unwrap();
        assert_eq!(
            config.storage,
            StorageSettings::Local {
                root: PathBuf::from("/srv/objects")
            }
        );
    }

    #[test]
    fn unknown_storage_backend_is_rejected() {
        let err = from_pairs(&[("STORAGE_BACKEND", "ftp")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "STORAGE_BACKEND must be a valid storage backend (s3 or local), got \"ftp\""
        );
    }

    #[test]
    fn values_override_defaults() {
        let config = from_pairs(&[
            ("APP_PORT", "9000"),
            ("ROOT_PATH", "transcription/"),
            ("REDIS_URL", "redis://cache:6379"),
            ("JOB_RETENTION_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.root_path, "/transcription");
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(config.job_retention, Duration::from_secs(60));
    }

    #[test]
    fn empty_values_fall_back_to_defaults() {
        let config = from_pairs(&[("APP_PORT", ""), ("ROOT_PATH", "/")]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.root_path, "");
    }

    #[test]
    fn unparsable_number_is_reported() {
        let err = from_pairs(&[("CONSUL_PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "CONSUL_PORT must be a valid port number, got \"eighty\""
        );
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        let err = from_pairs(&[("SWEEP_INTERVAL_SECS", "0")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "SWEEP_INTERVAL_SECS",
                expected: "positive number of seconds",
                value: "0".into(),
            }
        );
    }
}
