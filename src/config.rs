//! Configuration for the adapter and the publisher.
//!
//! Layered in this order, later layers winning:
//! 1. compiled defaults
//! 2. TOML file named by `CLIMATE_CONFIG` (optional)
//! 3. environment variables, after `.env` has been loaded
//!
//! Empty values count as unset at every layer.

use crate::auth::TokenSource;
use crate::error::ConfigError;
use crate::logging::{LogLevel, LogSettings};
use crate::store::bigtable;
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "CLIMATE_CONFIG";
pub const DEFAULT_PORT: u16 = 8080;

pub const DEFAULT_PUBSUB_ENDPOINT: &str = "https://pubsub.googleapis.com";
pub const DEFAULT_PUBSUB_PROJECT: &str = "climate-monitoring";
pub const DEFAULT_PUBSUB_TOPIC: &str = "climate-updates";

// ---------------------------------------------------------------------------
// File layer
// ---------------------------------------------------------------------------

/// Settings readable from the TOML file. Keys are the lowercase forms of the
/// environment variable names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub project: Option<String>,
    pub instance: Option<String>,
    pub table: Option<String>,
    pub port: Option<u16>,
    pub bigtable_endpoint: Option<String>,
    pub store_timeout_secs: Option<u64>,
    pub access_token: Option<String>,
    pub pubsub_project: Option<String>,
    pub pubsub_topic: Option<String>,
    pub pubsub_endpoint: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub log_timestamps: Option<bool>,
}

impl FileSettings {
    pub fn from_toml_str(path: &str, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFile {
            path: path.to_string(),
            source,
        })
    }

    /// Read the file named by `CLIMATE_CONFIG`, or empty settings if unset.
    pub fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let Some(path) = non_empty(lookup(CONFIG_PATH_VAR)) else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&path, &content)
    }
}

/// Trimmed value, `None` when unset or blank.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Environment value for `key`, falling back to the file value.
fn layered(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    file_value: &Option<String>,
) -> Option<String> {
    non_empty(lookup(key)).or_else(|| non_empty(file_value.clone()))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn log_settings(
    file: &FileSettings,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<LogSettings, ConfigError> {
    let mut settings = LogSettings::default();
    if let Some(level) = layered(lookup, "LOG_LEVEL", &file.log_level) {
        settings.min_level = level.parse::<LogLevel>()?;
    }
    settings.log_file = layered(lookup, "LOG_FILE", &file.log_file);
    if let Some(raw) = non_empty(lookup("LOG_TIMESTAMPS")) {
        settings.timestamps = parse_bool("LOG_TIMESTAMPS", &raw)?;
    } else if let Some(timestamps) = file.log_timestamps {
        settings.timestamps = timestamps;
    }
    Ok(settings)
}

/// Process environment, after `.env` has been merged into it.
fn process_env() -> impl Fn(&str) -> Option<String> {
    dotenv::dotenv().ok();
    |key: &str| std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterConfig {
    pub project: String,
    pub instance: String,
    pub table: String,
    pub port: u16,
    pub bigtable_endpoint: String,
    pub access_token: Option<String>,
    pub store_timeout: Option<Duration>,
    pub log: LogSettings,
}

impl AdapterConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = process_env();
        let file = FileSettings::load(&lookup)?;
        Self::from_sources(&file, &lookup)
    }

    /// Build from an already-read file layer and an environment lookup.
    ///
    /// `PROJECT`, `INSTANCE` and `TABLE` are mandatory; every missing one is
    /// reported in a single error.
    pub fn from_sources(
        file: &FileSettings,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let project = layered(lookup, "PROJECT", &file.project);
        let instance = layered(lookup, "INSTANCE", &file.instance);
        let table = layered(lookup, "TABLE", &file.table);

        let (project, instance, table) = match (project, instance, table) {
            (Some(p), Some(i), Some(t)) => (p, i, t),
            (p, i, t) => {
                let missing = [("PROJECT", p), ("INSTANCE", i), ("TABLE", t)]
                    .into_iter()
                    .filter(|(_, value)| value.is_none())
                    .map(|(key, _)| key)
                    .collect();
                return Err(ConfigError::Missing(missing));
            }
        };

        let port = match non_empty(lookup("PORT")) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw.clone(),
            })?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };

        let store_timeout = match non_empty(lookup("STORE_TIMEOUT_SECS")) {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "STORE_TIMEOUT_SECS",
                value: raw.clone(),
            })?),
            None => file.store_timeout_secs,
        }
        .map(Duration::from_secs);

        Ok(Self {
            project,
            instance,
            table,
            port,
            bigtable_endpoint: layered(lookup, "BIGTABLE_ENDPOINT", &file.bigtable_endpoint)
                .unwrap_or_else(|| bigtable::DEFAULT_ENDPOINT.to_string()),
            access_token: layered(lookup, "ACCESS_TOKEN", &file.access_token),
            store_timeout,
            log: log_settings(file, lookup)?,
        })
    }

    pub fn token_source(&self) -> TokenSource {
        TokenSource::from_settings(self.access_token.clone())
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub project: String,
    pub topic: String,
    pub endpoint: String,
    pub token_source: TokenSource,
    pub log: LogSettings,
}

impl PublisherConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = process_env();
        let file = FileSettings::load(&lookup)?;
        Self::from_sources(&file, &lookup)
    }

    /// `PUBSUB_EMULATOR_HOST` takes precedence over `PUBSUB_ENDPOINT` and
    /// disables authentication.
    pub fn from_sources(
        file: &FileSettings,
        lookup: &impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let (endpoint, token_source) = match non_empty(lookup("PUBSUB_EMULATOR_HOST")) {
            Some(host) => (format!("http://{}", host.trim()), TokenSource::Anonymous),
            None => (
                layered(lookup, "PUBSUB_ENDPOINT", &file.pubsub_endpoint)
                    .unwrap_or_else(|| DEFAULT_PUBSUB_ENDPOINT.to_string()),
                TokenSource::from_settings(layered(lookup, "ACCESS_TOKEN", &file.access_token)),
            ),
        };

        Ok(Self {
            project: layered(lookup, "PUBSUB_PROJECT", &file.pubsub_project)
                .unwrap_or_else(|| DEFAULT_PUBSUB_PROJECT.to_string()),
            topic: layered(lookup, "PUBSUB_TOPIC", &file.pubsub_topic)
                .unwrap_or_else(|| DEFAULT_PUBSUB_TOPIC.to_string()),
            endpoint,
            token_source,
            log: log_settings(file, lookup)?,
        })
    }
}
