pub mod config;
pub mod logging;
pub mod server;
pub mod service;
pub mod shutdown;

pub use config::{Config, ConfigError, LogLevel};
pub use logging::{LoggingError, init_tracing};
pub use service::{ChatServiceManager, ServiceError, ServiceManager};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct App {
    service_manager: ChatServiceManager,
}

impl App {
    /// Connects using an already resolved `config` (see [`Config::resolve`]).
    pub async fn from_config(config: Config) -> Result<Self, ServiceError> {
        info!("Starting chat-buffer v{}", get_version());
        info!(
            "Configuration: redis={}:{}/{}, backend={}, batch_size={}",
            config.redis_host,
            config.redis_port,
            config.redis_db,
            config.backend_url,
            config.batch_size
        );

        let service_manager = ChatServiceManager::connect(config).await?;
        Ok(Self { service_manager })
    }

    pub async fn run(self) -> Result<(), ServiceError> {
        let shutdown = CancellationToken::new();
        shutdown::cancel_on_signal(shutdown.clone());

        info!("chat-buffer is running. Press Ctrl+C to stop.");
        self.service_manager.run_until(shutdown).await?;
        info!("chat-buffer stopped.");
        Ok(())
    }
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let config = Config::parse().resolve()?;
    init_tracing(config.log_level)?;

    let app = App::from_config(config).await?;
    app.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn from_config_does_not_reload_the_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"redis_host = "not a host""#).unwrap();
        let config = Config {
            config_file: Some(file.path().to_path_buf()),
            ..Config::default()
        }
        .resolve()
        .unwrap();
        drop(file);

        let result = App::from_config(config).await;

        // Fails on the Redis address from the file, not on re-reading it.
        assert!(matches!(
            result,
            Err(ServiceError::ConfigError(ConfigError::InvalidUrl(_)))
        ));
    }
}
