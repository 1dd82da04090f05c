use super::payload::{BATCH_SIZE_HEADER, BatchPayload, SERVICE_NAME_HEADER};
use super::{PersistError, PersistenceClient};
use crate::domain::Message;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

const BATCH_PATH: &str = "/api/v1/chat/messages/batch";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub service_name: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(5),
            max_connections: 10,
            service_name: "chat-buffer".to_string(),
            user_agent: format!("chat-buffer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`PersistenceClient`] posting batches to the chat store's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPersistenceClient {
    client: Client,
    config: ClientConfig,
    batch_url: Url,
    service_name: HeaderValue,
}

impl HttpPersistenceClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let batch_url = batch_url(&config.backend_url)?;

        let service_name = HeaderValue::from_str(&config.service_name).map_err(|e| {
            ClientError::InvalidConfiguration(format!("Invalid service name: {e}"))
        })?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            batch_url,
            service_name,
        })
    }

    pub fn batch_url(&self) -> &Url {
        &self.batch_url
    }

    fn build_headers(&self, batch_size: usize) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static(SERVICE_NAME_HEADER),
            self.service_name.clone(),
        );
        headers.insert(HeaderName::from_static(BATCH_SIZE_HEADER), HeaderValue::from(batch_size));
        headers
    }
}

impl PersistenceClient for HttpPersistenceClient {
    async fn save(&self, batch: &[Message]) -> Result<(), PersistError> {
        let start = Instant::now();
        let body = serde_json::to_vec(&BatchPayload::from_messages(batch))
            .map_err(|e| PersistError::Serialization(e.to_string()))?;

        let request = self
            .client
            .post(self.batch_url.clone())
            .headers(self.build_headers(batch.len()))
            .body(body)
            .send();

        let response = timeout(self.config.timeout, request)
            .await
            .map_err(|_| PersistError::Timeout(self.config.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    PersistError::Timeout(self.config.timeout)
                } else {
                    PersistError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(
                "Persisted batch of {} messages in {:?} (HTTP {})",
                batch.len(),
                start.elapsed(),
                status.as_u16()
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Chat store rejected batch of {}: HTTP {}", batch.len(), status.as_u16());
        Err(PersistError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn batch_url(backend_url: &str) -> Result<Url, ClientError> {
    let mut url: Url = backend_url
        .parse()
        .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid backend URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidConfiguration(format!(
            "Backend URL cannot be a base: {backend_url}"
        )));
    }

    let base_path = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{base_path}{BATCH_PATH}"));
    Ok(url)
}
