use crate::domain::DeadLetterEntry;
use crate::queue::{DurableQueue, FAILED_MESSAGES_KEY, ListStore, QueueError};
use crate::sender::{PersistError, PersistenceClient};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum DeadLetterError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Nothing was waiting in the dead-letter store.
    Empty,
    Replayed { messages: usize },
    /// The single replay attempt failed; the entry went back into the store.
    Failed { messages: usize, error: PersistError },
}

/// Durable record of batches that exhausted their persistence attempts.
///
/// Entries leave the store only through [`DeadLetterStore::replay_oldest`]
/// or [`DeadLetterStore::pop_oldest`]; nothing ages them out.
pub struct DeadLetterStore<S> {
    queue: DurableQueue<S>,
}

impl<S> Clone for DeadLetterStore<S> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<S: ListStore> DeadLetterStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            queue: DurableQueue::new(store, FAILED_MESSAGES_KEY),
        }
    }

    pub async fn append(&self, entry: &DeadLetterEntry) -> Result<(), DeadLetterError> {
        let item = serde_json::to_string(entry)?;
        self.queue.enqueue(item).await?;
        Ok(())
    }

    /// Removes the oldest readable entry. Entries that no longer parse are
    /// logged and discarded on the way.
    pub async fn pop_oldest(&self) -> Result<Option<DeadLetterEntry>, DeadLetterError> {
        loop {
            let Some(raw) = self.queue.dequeue_up_to(1).await?.pop() else {
                return Ok(None);
            };
            match serde_json::from_str(&raw) {
                Ok(entry) => return Ok(Some(entry)),
                Err(e) => error!("Discarding unreadable dead-letter entry: {e} - Entry: {raw}"),
            }
        }
    }

    pub async fn length(&self) -> Result<usize, QueueError> {
        self.queue.length().await
    }

    /// Resubmits the oldest entry through `client` exactly once.
    pub async fn replay_oldest<P: PersistenceClient>(
        &self,
        client: &P,
    ) -> Result<ReplayOutcome, DeadLetterError> {
        let Some(entry) = self.pop_oldest().await? else {
            return Ok(ReplayOutcome::Empty);
        };
        let messages = entry.messages.len();

        match client.save(&entry.messages).await {
            Ok(()) => {
                info!(
                    "Replayed dead-letter batch of {} messages (failed at {})",
                    messages, entry.failed_at
                );
                Ok(ReplayOutcome::Replayed { messages })
            }
            Err(error) => {
                warn!("Dead-letter replay of {messages} messages failed: {error}");
                if let Err(e) = self.append(&entry).await {
                    error!(
                        "Failed to return replayed batch to dead-letter store: {}. Entry: {}",
                        e,
                        serde_json::to_string(&entry).unwrap_or_default()
                    );
                    return Err(e);
                }
                Ok(ReplayOutcome::Failed { messages, error })
            }
        }
    }
}
