//! Configuration for the speedreport daemon.
//!
//! Layered: compiled-in defaults, then an optional TOML file named by
//! `SPEEDREPORT_CONFIG`, then the environment variables the service has
//! always been deployed with (`UG_CLIENT_ID`, `SR_EMAIL_USER`, `HOST`, ...).
//! Empty variables count as unset.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_PATH_ENV: &str = "SPEEDREPORT_CONFIG";

const REDACTED: &str = "********";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0} is required but not set")]
    MissingCredential(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tool: ToolConfig,
    pub store: StoreConfig,
    pub email: EmailConfig,
    pub pipeline: PipelineConfig,
    pub lifecycle: LifecycleConfig,
}

impl Config {
    /// Parse a TOML file. Missing sections and keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Resolve the full configuration from the process environment and validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        let config = Self::from_lookup(base, |key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup` on top of `base`.
    pub fn from_lookup<F>(base: Self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = base;

        if let Some(v) = get("UG_CLIENT_ID") {
            config.store.client_id = v;
        }
        if let Some(v) = get("UG_CLIENT_SECRET") {
            config.store.client_secret = v;
        }
        if let Some(v) = get("SR_EMAIL_USER") {
            config.email.username = v;
        }
        if let Some(v) = get("SR_EMAIL_PASSWORD") {
            config.email.password = v;
        }
        if let Some(v) = get("SR_SMTP_HOST") {
            config.email.smtp_host = v;
        }
        if let Some(v) = get("SR_SMTP_PORT") {
            config.email.smtp_port = parse_number("SR_SMTP_PORT", &v)?;
        }
        if let Some(v) = get("HOST") {
            config.server.host = v;
        }
        if let Some(v) = get("PORT") {
            config.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("PHANTOMJS") {
            config.tool.executable = PathBuf::from(v);
        }
        if let Some(v) = get("SR_SCRIPT") {
            config.tool.script = PathBuf::from(v);
        }
        if let Some(v) = get("SR_MAX_CONCURRENT_TESTS") {
            config.pipeline.max_concurrent_tests = parse_number("SR_MAX_CONCURRENT_TESTS", &v)?;
        }
        if let Some(v) = get("SR_MAX_CONCURRENT_EMAILS") {
            config.pipeline.max_concurrent_emails =
                parse_number("SR_MAX_CONCURRENT_EMAILS", &v)?;
        }
        if let Some(v) = get("SR_DRAIN_TIMEOUT_SECS") {
            config.lifecycle.drain_timeout_secs = parse_number("SR_DRAIN_TIMEOUT_SECS", &v)?;
        }

        Ok(config)
    }

    /// Reject configurations the daemon cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.client_id.is_empty() {
            return Err(ConfigError::MissingCredential("UG_CLIENT_ID"));
        }
        if self.store.client_secret.is_empty() {
            return Err(ConfigError::MissingCredential("UG_CLIENT_SECRET"));
        }
        if self.email.username.is_empty() {
            return Err(ConfigError::MissingCredential("SR_EMAIL_USER"));
        }
        if self.email.password.is_empty() {
            return Err(ConfigError::MissingCredential("SR_EMAIL_PASSWORD"));
        }
        if self.pipeline.max_concurrent_tests == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.max_concurrent_tests",
                value: "0".to_string(),
            });
        }
        if self.pipeline.max_concurrent_emails == 0 {
            return Err(ConfigError::Invalid {
                key: "pipeline.max_concurrent_emails",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// A copy safe to print: secrets replaced.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for secret in [
            &mut copy.store.client_secret,
            &mut copy.email.password,
        ] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        copy
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 80,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The external measurement tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub executable: PathBuf,
    pub script: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("phantomjs"),
            script: PathBuf::from("/home/ubuntu/speedreport/speedreport.js"),
        }
    }
}

/// Usergrid application that records submitted requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_uri: String,
    pub organization: String,
    pub application: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://api.usergrid.com".to_string(),
            organization: "rbridges".to_string(),
            application: "speedreport".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

/// SMTP account and the fixed message headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub completion_subject: String,
    /// Receives the notice sent when the daemon exits.
    pub operator_address: String,
    pub operator_subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.1and1.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_address: "speedreport@fasterness.com".to_string(),
            completion_subject: "Your Web Performance adventure is waiting.".to_string(),
            operator_address: "ryan@fasterness.com".to_string(),
            operator_subject: "The server has exited.".to_string(),
        }
    }
}

/// Worker limits for the dispatcher and notifier stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent_tests: usize,
    pub max_concurrent_emails: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tests: 4,
            max_concurrent_emails: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long teardown waits for in-flight tests and emails. Zero exits immediately.
    pub drain_timeout_secs: u64,
}
