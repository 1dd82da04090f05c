use super::dead_letter::DeadLetterStore;
use super::metrics::BufferMetrics;
use crate::domain::{DeadLetterEntry, Message};
use crate::queue::ListStore;
use crate::sender::{PersistError, PersistenceClient};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// `base * 2^attempt`
    Exponential,
    /// `base * (attempt + 1)`
    #[default]
    Linear,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total persistence attempts per batch, the first one included. Only
    /// `delay_for(0)` through `delay_for(max_attempts - 2)` are ever waited;
    /// `delay_for(max_attempts - 1)` is never used.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60_000,
            strategy: RetryStrategy::Linear,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Wait after the failed attempt number `attempt` (0-based) before the
    /// next one.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms;
        let millis = match self.strategy {
            RetryStrategy::Exponential => {
                base.saturating_mul(1_u64.checked_shl(attempt).unwrap_or(u64::MAX))
            }
            RetryStrategy::Linear => base.saturating_mul(u64::from(attempt) + 1),
            RetryStrategy::Fixed => base,
        };
        let capped = millis.min(self.max_delay_ms);

        if self.jitter {
            let factor = rand::rng().random_range(0.5..1.5); // ±50% jitter
            Duration::from_millis((capped as f64 * factor) as u64)
        } else {
            Duration::from_millis(capped)
        }
    }
}

/// How a batch left the retry loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Persisted { attempts: u32 },
    DeadLettered { attempts: u32 },
    /// Attempts were exhausted and the dead-letter append failed too. The
    /// batch is handed back so the caller can keep it.
    DeadLetterFailed {
        attempts: u32,
        error: String,
        batch: Vec<Message>,
    },
}

/// Drives a batch through at most `max_attempts` persistence attempts and
/// hands it to the dead-letter store on exhaustion.
pub struct RetryController<S, P> {
    client: Arc<P>,
    dead_letters: DeadLetterStore<S>,
    config: RetryConfig,
    metrics: BufferMetrics,
    cancel: CancellationToken,
}

impl<S: ListStore, P: PersistenceClient> RetryController<S, P> {
    pub fn new(
        client: Arc<P>,
        dead_letters: DeadLetterStore<S>,
        config: RetryConfig,
        metrics: BufferMetrics,
    ) -> Self {
        Self {
            client,
            dead_letters,
            config,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Makes every remaining backoff wait return immediately. Attempts are
    /// still made, so exhausted batches are dead-lettered with the full count.
    pub fn cancel_waits(&self) {
        self.cancel.cancel();
    }

    pub async fn save_with_retry(&self, batch: Vec<Message>) -> RetryOutcome {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error: Option<PersistError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.config.delay_for(attempt - 1);
                info!(
                    "Retrying batch of {} messages in {:?} (attempt {}/{})",
                    batch.len(),
                    delay,
                    attempt + 1,
                    max_attempts
                );
                self.wait(delay).await;
            }

            match self.client.save(&batch).await {
                Ok(()) => {
                    self.metrics.record_persist_attempt(true);
                    if attempt > 0 {
                        info!(
                            "Persisted batch of {} messages on attempt {}",
                            batch.len(),
                            attempt + 1
                        );
                    }
                    return RetryOutcome::Persisted {
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    self.metrics.record_persist_attempt(false);
                    warn!(
                        "Persisting batch of {} messages failed (attempt {}/{}): {}",
                        batch.len(),
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        let entry = DeadLetterEntry::new(
            batch,
            max_attempts,
            last_error.map(|e| e.to_string()),
        );
        match self.dead_letters.append(&entry).await {
            Ok(()) => {
                warn!(
                    "Moved batch of {} messages to dead-letter store after {} attempts",
                    entry.messages.len(),
                    max_attempts
                );
                RetryOutcome::DeadLettered {
                    attempts: max_attempts,
                }
            }
            Err(e) => {
                error!(
                    "Failed to dead-letter batch of {} messages: {}",
                    entry.messages.len(),
                    e
                );
                RetryOutcome::DeadLetterFailed {
                    attempts: max_attempts,
                    error: e.to_string(),
                    batch: entry.messages,
                }
            }
        }
    }

    async fn wait(&self, delay: Duration) {
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = self.cancel.cancelled() => {
                debug!("Backoff wait cancelled, retrying immediately");
            }
        }
    }
}
