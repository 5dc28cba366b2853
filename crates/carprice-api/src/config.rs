//! Server configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! (`--config` or `CARPRICE_CONFIG`), then `CARPRICE_*` environment variables.
//! CLI flags are applied last by the `serve` command.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "CARPRICE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    /// Log level used when none is configured
    pub fn default_log_level(&self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Production => "warn",
            Environment::Testing => "info",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "testing" | "test" => Ok(Environment::Testing),
            _ => Err(ConfigError::InvalidValue {
                key: "environment".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                key: "log_format".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Artifact loaded at startup and by `POST /model/reload`
    pub model_path: PathBuf,
    pub environment: Environment,
    /// Version reported by `/health`
    pub api_version: String,
    /// Mount point for every route; empty mounts at the root
    pub api_prefix: String,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
    /// Reject request keys that are not in the feature schema
    pub strict_validation: bool,
    /// Let `POST /model/reload` name an artifact path in its body
    pub allow_reload_path: bool,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            model_path: PathBuf::from("models/vehicle_price_model.json"),
            environment: Environment::default(),
            api_version: "1.0.0".to_string(),
            api_prefix: "/api/v1".to_string(),
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
            max_body_bytes: 64 * 1024,
            strict_validation: false,
            allow_reload_path: false,
            log_level: None,
            log_format: None,
        }
    }
}

impl ServerConfig {
    /// Defaults, then the config file, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `CARPRICE_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("CARPRICE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("CARPRICE_PORT").or_else(|| lookup("PORT")) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "port".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(path) = lookup("CARPRICE_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(env) = lookup("CARPRICE_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(level) = lookup("CARPRICE_LOG_LEVEL") {
            self.log_level = Some(level);
        }
        if let Some(format) = lookup("CARPRICE_LOG_FORMAT") {
            self.log_format = Some(format.parse()?);
        }
        if let Some(prefix) = lookup("CARPRICE_API_PREFIX") {
            self.api_prefix = prefix;
        }
        Ok(())
    }

    /// Canonicalise the route prefix to `""` or `/segment[/segment]`
    pub fn normalize(&mut self) {
        let trimmed = self.api_prefix.trim().trim_end_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            String::new()
        } else if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("model_path must not be empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn effective_log_level(&self) -> &str {
        self.log_level
            .as_deref()
            .unwrap_or_else(|| self.environment.default_log_level())
    }

    /// JSON in production unless configured otherwise
    pub fn effective_log_format(&self) -> LogFormat {
        self.log_format.unwrap_or(match self.environment {
            Environment::Production => LogFormat::Json,
            _ => LogFormat::Pretty,
        })
    }
}
