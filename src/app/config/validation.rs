use super::{Config, ConfigError};
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate backend URL
        let url = Url::parse(&self.backend_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid backend URL '{}': {}", self.backend_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "Backend URL must be http(s): {}",
                self.backend_url
            )));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch size must be greater than 0".to_string(),
            ));
        }

        if self.batch_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Batch interval must be greater than 0".to_string(),
            ));
        }

        if self.persist_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Persist timeout must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "Retry max attempts must be greater than 0".to_string(),
            ));
        }

        if self.redis_host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Redis host must not be empty".to_string(),
            ));
        }

        self.http_addr()?;
        Ok(())
    }
}
