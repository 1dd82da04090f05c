use super::Config;
use super::config::ConfigError;
use super::server;
use crate::buffer::{BatchScheduler, MessageBuffer, flush_channel};
use crate::queue::{ListStore, QueueError, RedisListStore};
use crate::reliability::{BufferMetrics, MetricsError};
use crate::sender::{ClientError, HttpPersistenceClient, PersistenceClient};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),
    #[error("Client error: {0}")]
    ClientError(#[from] ClientError),
    #[error("Metrics error: {0}")]
    MetricsError(#[from] MetricsError),
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Server(#[source] std::io::Error),
}

/// The production wiring: Redis lists and the HTTP chat store.
pub type ChatServiceManager = ServiceManager<RedisListStore, HttpPersistenceClient>;

/// Owns the buffer and its scheduler for the lifetime of the process.
pub struct ServiceManager<S, P> {
    config: Config,
    buffer: Arc<MessageBuffer<S, P>>,
    scheduler: BatchScheduler<S, P>,
}

impl ChatServiceManager {
    pub async fn connect(config: Config) -> Result<Self, ServiceError> {
        let store = RedisListStore::connect(&config.redis_url()?).await?;
        let client = HttpPersistenceClient::new(config.client_config())?;
        info!(
            "Persisting batches to {} (timeout {:?})",
            client.batch_url(),
            config.persist_timeout()
        );
        Self::from_parts(config, Arc::new(store), Arc::new(client))
    }
}

impl<S: ListStore, P: PersistenceClient> ServiceManager<S, P> {
    pub fn from_parts(config: Config, store: Arc<S>, client: Arc<P>) -> Result<Self, ServiceError> {
        let (trigger, requests) = flush_channel();
        let buffer = Arc::new(MessageBuffer::with_metrics(
            store,
            client,
            config.buffer_config(),
            trigger,
            BufferMetrics::new()?,
        ));
        let scheduler = BatchScheduler::new(Arc::clone(&buffer), requests);

        Ok(Self {
            config,
            buffer,
            scheduler,
        })
    }

    pub fn buffer(&self) -> &Arc<MessageBuffer<S, P>> {
        &self.buffer
    }

    /// Starts the scheduler, serves HTTP until `shutdown` fires, then drains
    /// and disconnects.
    pub async fn run_until(self, shutdown: CancellationToken) -> Result<(), ServiceError> {
        let address = self.config.http_addr()?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServiceError::Bind { address, source })?;
        self.serve(listener, shutdown).await
    }

    pub async fn serve(
        mut self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), ServiceError> {
        self.scheduler.start();
        info!(
            "Buffering with batch_size={}, batch_interval={}ms",
            self.config.batch_size, self.config.batch_interval_ms
        );
        if let Ok(address) = listener.local_addr() {
            info!("Listening on {}", address);
        }

        let app = server::router(Arc::clone(&self.buffer));
        let server_shutdown = shutdown.clone();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await;

        self.shutdown().await;
        served.map_err(ServiceError::Server)
    }

    /// Stop timers, drain once, then release the queue connection. New
    /// ingestion has already stopped when this runs.
    async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");
        self.buffer.cancel_backoff();
        self.scheduler.cancel_all().await;

        let outcome = self.buffer.process_batch().await;
        info!("Final drain: {:?}", outcome);

        match self.buffer.status().await {
            Ok(status) if status.buffer_size > 0 => warn!(
                "{} messages remain in the durable buffer for the next start",
                status.buffer_size
            ),
            Ok(_) => {}
            Err(e) => error!("Could not read buffer status at shutdown: {e}"),
        }

        let parked = self.buffer.parked_messages();
        if !parked.is_empty() {
            error!(
                "{} messages could not be returned to the queue before shutdown: {}",
                parked.len(),
                serde_json::to_string(&parked).unwrap_or_default()
            );
        }

        self.buffer.disconnect().await;
        info!("Graceful shutdown completed");
    }
}
