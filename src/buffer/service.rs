use super::scheduler::FlushTrigger;
use crate::domain::{BufferStatus, IncomingMessage, Message};
use crate::queue::{DurableQueue, ListStore, MESSAGE_BUFFER_KEY, QueueError};
use crate::reliability::{
    BufferMetrics, DeadLetterError, DeadLetterStore, ReplayOutcome, RetryConfig, RetryController,
    RetryOutcome,
};
use crate::sender::PersistenceClient;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub batch_size: usize,
    pub batch_interval: Duration,
    /// Window in which threshold-triggered flush requests collapse into one.
    pub flush_debounce: Duration,
    pub retry: RetryConfig,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_interval: Duration::from_millis(5000),
            flush_debounce: Duration::from_millis(100),
            retry: RetryConfig::default(),
        }
    }
}

/// Result of one `process_batch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Another batch was already in flight; nothing was done.
    InFlight,
    Empty,
    Persisted { messages: usize, attempts: u32 },
    DeadLettered { messages: usize },
    /// Dead-lettering failed; the batch went back to the head of the buffer.
    Requeued { messages: usize },
    /// Neither list accepted the batch. It is held in memory and returned to
    /// the buffer head before the next batch is drained.
    Parked { messages: usize },
    /// Every dequeued item was malformed.
    Dropped { malformed: usize },
    QueueUnavailable,
}

/// Durable chat-message buffer: ingestion on one side, single-flight batch
/// processing on the other.
pub struct MessageBuffer<S, P> {
    queue: DurableQueue<S>,
    dead_letters: DeadLetterStore<S>,
    retry: RetryController<S, P>,
    client: Arc<P>,
    config: BufferConfig,
    flush: FlushTrigger,
    metrics: BufferMetrics,
    is_processing: AtomicBool,
    parked: Mutex<Vec<Message>>,
}

impl<S: ListStore, P: PersistenceClient> MessageBuffer<S, P> {
    pub fn new(store: Arc<S>, client: Arc<P>, config: BufferConfig, flush: FlushTrigger) -> Self {
        Self::with_metrics(store, client, config, flush, BufferMetrics::disabled())
    }

    pub fn with_metrics(
        store: Arc<S>,
        client: Arc<P>,
        config: BufferConfig,
        flush: FlushTrigger,
        metrics: BufferMetrics,
    ) -> Self {
        let queue = DurableQueue::new(Arc::clone(&store), MESSAGE_BUFFER_KEY);
        let dead_letters = DeadLetterStore::new(store);
        let retry = RetryController::new(
            Arc::clone(&client),
            dead_letters.clone(),
            config.retry.clone(),
            metrics.clone(),
        );

        Self {
            queue,
            dead_letters,
            retry,
            client,
            config,
            flush,
            metrics,
            is_processing: AtomicBool::new(false),
            parked: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BufferMetrics {
        &self.metrics
    }

    pub fn dead_letters(&self) -> &DeadLetterStore<S> {
        &self.dead_letters
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::Acquire)
    }

    /// Messages held in memory because no list accepted them.
    pub fn parked_len(&self) -> usize {
        self.parked.lock().len()
    }

    pub fn parked_messages(&self) -> Vec<Message> {
        self.parked.lock().clone()
    }

    /// Stamps and enqueues a message, returning its id.
    ///
    /// When the queue depth reaches the batch size an immediate (debounced)
    /// flush is requested instead of waiting for the next periodic tick.
    pub async fn buffer_message(&self, incoming: IncomingMessage) -> Result<String, BufferError> {
        let message = Message::stamp(incoming);
        let id = message.id().to_string();
        self.queue.enqueue(serde_json::to_string(&message)?).await?;
        self.metrics.record_buffered();

        // The message is durable at this point; a failed depth read only
        // costs the early flush.
        match self.queue.length().await {
            Ok(depth) if depth >= self.config.batch_size => {
                debug!(depth, "Buffer reached batch size, requesting immediate flush");
                self.flush.request();
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read buffer depth after enqueue: {e}"),
        }

        Ok(id)
    }

    pub fn request_flush(&self) {
        self.flush.request();
    }

    /// Drains up to `batch_size` messages and persists them as one batch.
    ///
    /// At most one call runs at a time; overlapping calls return
    /// [`ProcessOutcome::InFlight`] immediately. Never fails: every error is
    /// logged and reflected in the outcome.
    pub async fn process_batch(&self) -> ProcessOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.is_processing) else {
            debug!("Batch already in flight, skipping");
            return ProcessOutcome::InFlight;
        };

        match self.drain_once().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Batch processing aborted: {e}");
                ProcessOutcome::QueueUnavailable
            }
        }
    }

    async fn drain_once(&self) -> Result<ProcessOutcome, BufferError> {
        self.restore_parked().await?;

        let length = self.queue.length().await?;
        if length == 0 {
            return Ok(ProcessOutcome::Empty);
        }

        let raw = self
            .queue
            .dequeue_up_to(length.min(self.config.batch_size))
            .await?;
        if raw.is_empty() {
            return Ok(ProcessOutcome::Empty);
        }

        let (batch, malformed) = parse_items(raw);
        if malformed > 0 {
            self.metrics.record_malformed(malformed);
        }
        if batch.is_empty() {
            return Ok(ProcessOutcome::Dropped { malformed });
        }

        let messages = batch.len();
        debug!("Processing batch of {messages} messages");

        let outcome = match self.retry.save_with_retry(batch).await {
            RetryOutcome::Persisted { attempts } => {
                self.metrics.record_batch("persisted", messages);
                info!("Persisted batch of {messages} messages");
                ProcessOutcome::Persisted { messages, attempts }
            }
            RetryOutcome::DeadLettered { .. } => {
                self.metrics.record_batch("dead_lettered", messages);
                ProcessOutcome::DeadLettered { messages }
            }
            RetryOutcome::DeadLetterFailed { batch, .. } => {
                self.metrics.record_batch("dead_letter_failed", messages);
                match self.return_to_head(&batch).await {
                    Ok(()) => {
                        warn!("Returned batch of {messages} messages to the buffer head");
                        ProcessOutcome::Requeued { messages }
                    }
                    Err(e) => {
                        error!(
                            "Could not return batch of {messages} messages to the buffer: {e}. \
                             Holding it in memory until the store recovers"
                        );
                        self.parked.lock().extend(batch);
                        ProcessOutcome::Parked { messages }
                    }
                }
            }
        };
        Ok(outcome)
    }

    async fn return_to_head(&self, batch: &[Message]) -> Result<(), BufferError> {
        let items = batch
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.queue.requeue_front(items).await?;
        Ok(())
    }

    /// Moves parked messages back to the buffer head, oldest first.
    async fn restore_parked(&self) -> Result<(), BufferError> {
        let parked = std::mem::take(&mut *self.parked.lock());
        if parked.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.return_to_head(&parked).await {
            *self.parked.lock() = parked;
            return Err(e);
        }
        info!("Returned {} parked messages to the buffer", parked.len());
        Ok(())
    }

    pub async fn status(&self) -> Result<BufferStatus, QueueError> {
        Ok(BufferStatus {
            buffer_size: self.queue.length().await?,
            dead_letter_size: self.dead_letters.length().await?,
            is_processing: self.is_processing(),
            batch_size: self.config.batch_size,
            batch_interval_ms: self.config.batch_interval.as_millis() as u64,
        })
    }

    /// Operator-triggered resubmission of the oldest dead-letter entry.
    pub async fn replay_oldest_dead_letter(&self) -> Result<ReplayOutcome, DeadLetterError> {
        let outcome = self.dead_letters.replay_oldest(self.client.as_ref()).await?;
        match &outcome {
            ReplayOutcome::Replayed { .. } => self.metrics.record_replay(true),
            ReplayOutcome::Failed { .. } => self.metrics.record_replay(false),
            ReplayOutcome::Empty => {}
        }
        Ok(outcome)
    }

    /// Skips pending and future backoff waits. Used at shutdown.
    pub fn cancel_backoff(&self) {
        self.retry.cancel_waits();
    }

    pub async fn ping(&self) -> Result<(), QueueError> {
        self.queue.store().ping().await
    }

    pub async fn disconnect(&self) {
        self.queue.store().disconnect().await;
    }
}

fn parse_items(raw: Vec<String>) -> (Vec<Message>, usize) {
    let mut batch = Vec::with_capacity(raw.len());
    let mut malformed = 0;
    for item in raw {
        match serde_json::from_str::<Message>(&item) {
            Ok(message) => batch.push(message),
            Err(e) => {
                malformed += 1;
                warn!("Dropping malformed buffered message: {e} - Item: {item}");
            }
        }
    }
    (batch, malformed)
}

/// Single-flight flag holder; clears the flag when dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
