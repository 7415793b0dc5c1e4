//! # Configuration Management for recipe-cache
//!
//! This crate provides the configuration structures consumed by the cache
//! manager at `connect()` time: connection settings, timeouts, key prefix,
//! log level and the environment flag.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{CacheConfig, Environment};
//!
//! let cache_config = CacheConfig::new("localhost".to_string(), 6379, 0)
//!     .with_password("secret")
//!     .with_key_prefix("recipe_app:");
//!
//! assert_eq!(cache_config.port, 6379);
//! assert!(!Environment::Development.is_production());
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! environment = "production"
//!
//! [cache]
//! host = "localhost"
//! port = 6379
//! db = 0
//! key_prefix = "recipe_app:"
//! default_ttl_seconds = 3600
//! connect_timeout_ms = 10000
//! command_timeout_ms = 5000
//! max_retries_per_request = 3
//! retry_step_ms = 50
//! retry_max_delay_ms = 2000
//! scan_batch_size = 100
//!
//! [logging]
//! level = "info"
//! json = false
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Defaults, then recipe_cache.toml (or RECIPE_CACHE_CONFIG), then env overrides
//! let config = AppConfig::load()?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{convert::Infallible, env, fmt, path::Path, str::FromStr, time::Duration};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./recipe_cache.toml";
const CONFIG_PATH_VAR: &str = "RECIPE_CACHE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Deployment environment the process runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Parse an `APP_ENV` value; unrecognised names fall back to development
    pub fn from_name(name: &str) -> Environment {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

impl FromStr for Environment {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Environment::from_name(s))
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Redis cache configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Store-wide prefix applied to every key
    pub key_prefix: String,
    pub default_ttl_seconds: u64,
    pub connect_timeout_ms: u64,
    /// Ceiling for a single command round-trip
    pub command_timeout_ms: u64,
    pub max_retries_per_request: u32,
    pub retry_step_ms: u64,
    pub retry_max_delay_ms: u64,
    pub scan_batch_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: "recipe_app:".to_string(),
            default_ttl_seconds: 3600,
            connect_timeout_ms: 10_000,
            command_timeout_ms: 5_000,
            max_retries_per_request: 3,
            retry_step_ms: 50,
            retry_max_delay_ms: 2_000,
            scan_batch_size: 100,
        }
    }
}

// Password stays out of Debug output so configs can be logged safely
impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("key_prefix", &self.key_prefix)
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("command_timeout_ms", &self.command_timeout_ms)
            .field("max_retries_per_request", &self.max_retries_per_request)
            .field("retry_step_ms", &self.retry_step_ms)
            .field("retry_max_delay_ms", &self.retry_max_delay_ms)
            .field("scan_batch_size", &self.scan_batch_size)
            .finish()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the TOML file named by
    /// `RECIPE_CACHE_CONFIG` (or `./recipe_cache.toml` if present), then
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(err) if err.not_found() => {}
            Err(err) => return Err(err.into()),
        }

        let mut config = if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::read_file(&config_path)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::read_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };

        config.apply_env_overrides_from(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Recognised variables: `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`,
    /// `REDIS_DB`, `REDIS_KEY_PREFIX`, `LOG_LEVEL`, `APP_ENV`.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REDIS_HOST") {
            self.cache.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            self.cache.port = parse_var("REDIS_PORT", &port)?;
        }
        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.cache.password = (!password.is_empty()).then_some(password);
        }
        if let Some(db) = lookup("REDIS_DB") {
            self.cache.db = parse_var("REDIS_DB", &db)?;
        }
        if let Some(prefix) = lookup("REDIS_KEY_PREFIX") {
            self.cache.key_prefix = prefix;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(environment) = lookup("APP_ENV") {
            self.environment = Environment::from_name(&environment);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Log level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}

impl CacheConfig {
    /// Create a new cache configuration with default timeouts
    pub fn new(host: String, port: u16, db: i64) -> Self {
        Self {
            host,
            port,
            db,
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl_seconds = seconds;
        self
    }

    pub fn with_command_timeout(mut self, timeout_ms: u64) -> Self {
        self.command_timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_retries_per_request(mut self, retries: u32) -> Self {
        self.max_retries_per_request = retries;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Delay before reconnect attempt `attempt` (1-based):
    /// `min(attempt * retry_step_ms, retry_max_delay_ms)`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay = u64::from(attempt)
            .saturating_mul(self.retry_step_ms)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(delay)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Redis host cannot be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "Redis port cannot be zero".to_string(),
            ));
        }
        if self.db < 0 {
            return Err(ConfigError::Invalid(
                "Redis db index cannot be negative".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache command_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.retry_max_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache retry_max_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.scan_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "Cache scan_batch_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
