//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! file path defaults to `config.yaml` but can be specified via `-f` flag or the
//! `BILLROAST_CONFIG` environment variable. A missing file is not an error: every field has a
//! default.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration
//! 2. **Environment variables** - Variables prefixed with `BILLROAST_` override YAML values
//! 3. **VERCEL** - Special case: when set, uploads are kept in memory regardless of `storage`
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `BILLROAST_STORAGE__TYPE=memory` sets the `storage.type` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 3000
//! storage:
//!   type: local
//!   path: uploads
//! uploads:
//!   max_file_size: 10485760
//!   max_field_size: 1048576
//! analysis:
//!   delay: 3s
//!   timeout: 10s
//! cors:
//!   allowed_origins: ["*"]
//! request_timeout: 30s
//! ```

use axum::http::{HeaderName, Method};
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use url::Url;

/// 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 1 MiB
pub const DEFAULT_MAX_FIELD_SIZE: u64 = 1024 * 1024;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "BILLROAST_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Where uploaded bills are kept
    pub storage: StorageConfig,
    /// Upload validation rules
    pub uploads: UploadConfig,
    /// Analyzer timing
    pub analysis: AnalysisConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Upper bound on the time spent handling any single request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Console log output format
    pub log_format: LogFormat,
}

/// Storage backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Durable storage in a local directory, created at startup if missing
    Local {
        #[serde(default = "default_upload_dir")]
        path: PathBuf,
    },
    /// Ephemeral in-memory storage, for read-only or serverless filesystems
    Memory,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

/// Upload validation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum size of an uploaded file in bytes (default: 10 MiB)
    pub max_file_size: u64,
    /// Multipart field the file must be sent under (default: "bill")
    pub field_name: String,
    /// Maximum size of each non-file form value in bytes (default: 1 MiB)
    pub max_field_size: u64,
    /// Maximum number of non-file form values per upload (default: 32)
    pub max_fields: u64,
}

impl UploadConfig {
    /// Largest request body an accepted upload can have, before multipart framing overhead
    pub fn max_body_size(&self) -> u64 {
        self.max_file_size
            .saturating_add(self.max_field_size.saturating_mul(self.max_fields))
    }
}

/// Analyzer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Artificial latency of the canned analyzer
    #[serde(with = "humantime_serde")]
    pub delay: Duration,
    /// Analyses running longer than this fail with 503
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allowed request methods
    pub allowed_methods: Vec<String>,
    /// Allowed request headers
    pub allowed_headers: Vec<String>,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

/// A single allowed CORS origin.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            storage: StorageConfig::default(),
            uploads: UploadConfig::default(),
            analysis: AnalysisConfig::default(),
            cors: CorsConfig::default(),
            request_timeout: Duration::from_secs(30),
            enable_otel_export: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            path: default_upload_dir(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            field_name: "bill".to_string(),
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
            max_fields: 32,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(3000),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"].map(String::from).to_vec(),
            allowed_headers: ["Content-Type", "Authorization"].map(String::from).to_vec(),
            max_age: None,
        }
    }
}

impl CorsConfig {
    pub fn methods(&self) -> anyhow::Result<Vec<Method>> {
        self.allowed_methods
            .iter()
            .map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).map_err(|_| anyhow::anyhow!("invalid CORS method '{m}'")))
            .collect()
    }

    pub fn headers(&self) -> anyhow::Result<Vec<HeaderName>> {
        self.allowed_headers
            .iter()
            .map(|h| HeaderName::from_bytes(h.trim().as_bytes()).map_err(|_| anyhow::anyhow!("invalid CORS header '{h}'")))
            .collect()
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard))
    }
}

/// Vercel sets `VERCEL` in every deployment; its value is irrelevant
fn is_serverless() -> bool {
    Figment::from(Env::raw().only(&["VERCEL"])).contains("vercel")
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // Serverless filesystems are read-only or wiped between invocations
        if is_serverless() {
            config.storage = StorageConfig::Memory;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values
            .merge(Env::prefixed("BILLROAST_").ignore(&["config"]).split("__"))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.uploads.max_file_size == 0 {
            anyhow::bail!("Config validation: uploads.max_file_size must be greater than 0");
        }

        if self.uploads.max_field_size == 0 {
            anyhow::bail!("Config validation: uploads.max_field_size must be greater than 0");
        }

        if self.uploads.field_name.trim().is_empty() {
            anyhow::bail!("Config validation: uploads.field_name cannot be empty");
        }

        if let StorageConfig::Local { path } = &self.storage
            && path.as_os_str().is_empty()
        {
            anyhow::bail!("Config validation: storage.path cannot be empty for local storage");
        }

        if self.request_timeout.is_zero() || self.analysis.timeout.is_zero() {
            anyhow::bail!("Config validation: request_timeout and analysis.timeout must be greater than 0");
        }

        // Analysis must fail on its own timeout first so the client gets a meaningful error
        if self.analysis.timeout >= self.request_timeout {
            anyhow::bail!(
                "Config validation: analysis.timeout ({:?}) must be shorter than request_timeout ({:?})",
                self.analysis.timeout,
                self.request_timeout
            );
        }

        self.cors.methods()?;
        self.cors.headers()?;

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
