use super::{ConfigError, LogLevel};
use crate::buffer::BufferConfig;
use crate::reliability::RetryConfig;
use crate::sender::ClientConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_FLUSH_DEBOUNCE_MS: u64 = 100;

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Redis host holding the message buffer
    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    /// Redis ACL username
    #[arg(long, env = "REDIS_USERNAME")]
    pub redis_username: Option<String>,

    /// Redis password
    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true)]
    pub redis_password: Option<String>,

    /// Redis database index
    #[arg(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: u32,

    /// Maximum number of messages per batch; also the immediate-flush threshold
    #[arg(long, env = "BATCH_SIZE", default_value = "50")]
    pub batch_size: usize,

    /// Periodic flush interval in milliseconds
    #[arg(long = "batch-interval", env = "BATCH_INTERVAL", default_value = "5000")]
    pub batch_interval_ms: u64,

    /// Base URL of the chat store API
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    /// Timeout for one batch persistence request, in seconds
    #[arg(long, env = "PERSIST_TIMEOUT_SECS", default_value = "10")]
    pub persist_timeout_secs: u64,

    /// Value of the service identity header sent to the chat store
    #[arg(long, env = "SERVICE_NAME", default_value = "chat-buffer")]
    pub service_name: String,

    /// Address the HTTP surface binds to
    #[arg(long, env = "HTTP_HOST", default_value = "0.0.0.0")]
    pub http_host: String,

    /// Port the HTTP surface listens on
    #[arg(long, env = "HTTP_PORT", default_value = "3100")]
    pub http_port: u16,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Immediate-flush debounce window (file only)
    #[arg(skip = DEFAULT_FLUSH_DEBOUNCE_MS)]
    pub flush_debounce_ms: u64,

    /// Retry configuration (file only)
    #[arg(skip)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_username: None,
            redis_password: None,
            redis_db: 0,
            batch_size: 50,
            batch_interval_ms: 5000,
            backend_url: "http://localhost:8080".to_string(),
            persist_timeout_secs: 10,
            service_name: "chat-buffer".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 3100,
            log_level: LogLevel::Info,
            config_file: None,
            flush_debounce_ms: DEFAULT_FLUSH_DEBOUNCE_MS,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::try_parse_from(args)?.resolve()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `config_file` when one was given (the file then wins entirely),
    /// and validates the result.
    pub fn resolve(self) -> Result<Self, ConfigError> {
        if let Some(path) = &self.config_file {
            let mut from_file = Self::from_file(path)?;
            from_file.config_file = Some(path.clone());
            return Ok(from_file);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }

    /// `redis://[user[:password]@]host:port/db`
    pub fn redis_url(&self) -> Result<String, ConfigError> {
        let mut url = Url::parse(&format!(
            "redis://{}:{}/{}",
            self.redis_host, self.redis_port, self.redis_db
        ))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid Redis address: {e}")))?;

        if let Some(username) = &self.redis_username {
            url.set_username(username)
                .map_err(|()| ConfigError::InvalidConfig("Invalid Redis username".to_string()))?;
        }
        if let Some(password) = &self.redis_password {
            url.set_password(Some(password))
                .map_err(|()| ConfigError::InvalidConfig("Invalid Redis password".to_string()))?;
        }
        Ok(url.to_string())
    }

    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.http_host, self.http_port)
            .parse()
            .map_err(|e| ConfigError::InvalidConfig(format!("Invalid HTTP bind address: {e}")))
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            batch_size: self.batch_size,
            batch_interval: self.batch_interval(),
            flush_debounce: Duration::from_millis(self.flush_debounce_ms),
            retry: self.retry.clone(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            backend_url: self.backend_url.clone(),
            timeout: self.persist_timeout(),
            service_name: self.service_name.clone(),
            ..ClientConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    #[serial]
    fn defaults_match_documented_values() {
        let config = Config::from_args(["chat-buffer"]).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.batch_interval(), Duration::from_millis(5000));
        assert_eq!(config.flush_debounce_ms, 100);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.persist_timeout(), Duration::from_secs(10));
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        // SAFETY: tests touching the environment are serialized.
        unsafe {
            std::env::set_var("BATCH_SIZE", "25");
            std::env::set_var("BATCH_INTERVAL", "1500");
            std::env::set_var("BACKEND_URL", "http://chat-api:9000");
        }

        let config = Config::from_args(["chat-buffer"]);

        unsafe {
            std::env::remove_var("BATCH_SIZE");
            std::env::remove_var("BATCH_INTERVAL");
            std::env::remove_var("BACKEND_URL");
        }

        let config = config.unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.batch_interval_ms, 1500);
        assert_eq!(config.backend_url, "http://chat-api:9000");
    }

    #[test]
    #[serial]
    fn redis_url_includes_credentials_and_db() {
        let config = Config::from_args([
            "chat-buffer",
            "--redis-host",
            "cache",
            "--redis-port",
            "6380",
            "--redis-password",
            "s3cret",
            "--redis-db",
            "2",
        ])
        .unwrap();

        assert_eq!(config.redis_url().unwrap(), "redis://:s3cret@cache:6380/2");
    }

    #[test]
    #[serial]
    fn zero_batch_size_is_rejected() {
        let result = Config::from_args(["chat-buffer", "--batch-size", "0"]);
        assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
    }

    #[test]
    fn file_configures_retry_group() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
batch_size = 10
backend_url = "http://store:8080"
flush_debounce_ms = 250

[retry]
max_attempts = 5
strategy = "exponential"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_debounce_ms, 250);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 2000);
        assert_eq!(config.redis_port, 6379);
    }
}
