#![allow(dead_code)]

use chat_buffer::buffer::{BufferConfig, FlushRequests, MessageBuffer, flush_channel};
use chat_buffer::domain::{IncomingMessage, Message};
use chat_buffer::queue::MemoryListStore;
use chat_buffer::sender::{PersistError, PersistenceClient};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type AttemptHook = Box<dyn Fn(usize) + Send + Sync>;

/// Persistence client that replays a script of results and records what it
/// was asked to save.
pub struct RecordingClient {
    script: Mutex<VecDeque<Result<(), PersistError>>>,
    fallback: Result<(), PersistError>,
    delay: Duration,
    on_attempt: Option<AttemptHook>,
    persisted: Mutex<Vec<Vec<Message>>>,
    attempts: Mutex<Vec<(Instant, Vec<Message>)>>,
}

impl RecordingClient {
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fallback: Err(PersistError::Status {
                status: 503,
                body: "store down".to_string(),
            }),
            ..Self::succeeding()
        }
    }

    /// Returns the scripted results in order, then succeeds.
    pub fn scripted(results: Vec<Result<(), PersistError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: Ok(()),
            delay: Duration::ZERO,
            on_attempt: None,
            persisted: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Runs `hook` with the 1-based attempt number before each attempt
    /// resolves.
    pub fn on_attempt(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_attempt = Some(Box::new(hook));
        self
    }

    pub fn persisted(&self) -> Vec<Vec<Message>> {
        self.persisted.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().iter().map(|(at, _)| *at).collect()
    }

    pub fn attempted_batches(&self) -> Vec<Vec<Message>> {
        self.attempts.lock().iter().map(|(_, b)| b.clone()).collect()
    }
}

impl PersistenceClient for RecordingClient {
    async fn save(&self, batch: &[Message]) -> Result<(), PersistError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            attempts.push((Instant::now(), batch.to_vec()));
            attempts.len()
        };
        if let Some(hook) = &self.on_attempt {
            hook(attempt);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        if result.is_ok() {
            self.persisted.lock().push(batch.to_vec());
        }
        result
    }
}

pub type TestBuffer = MessageBuffer<MemoryListStore, RecordingClient>;

pub struct Pipeline {
    pub store: Arc<MemoryListStore>,
    pub client: Arc<RecordingClient>,
    pub buffer: Arc<TestBuffer>,
    pub requests: Option<FlushRequests>,
}

pub fn pipeline(config: BufferConfig, client: RecordingClient) -> Pipeline {
    pipeline_on(Arc::new(MemoryListStore::new()), config, client)
}

pub fn pipeline_on(
    store: Arc<MemoryListStore>,
    config: BufferConfig,
    client: RecordingClient,
) -> Pipeline {
    let client = Arc::new(client);
    let (trigger, requests) = flush_channel();
    let buffer = Arc::new(MessageBuffer::new(
        Arc::clone(&store),
        Arc::clone(&client),
        config,
        trigger,
    ));

    Pipeline {
        store,
        client,
        buffer,
        requests: Some(requests),
    }
}

pub fn config_with_batch_size(batch_size: usize) -> BufferConfig {
    BufferConfig {
        batch_size,
        ..BufferConfig::default()
    }
}

pub fn chat(n: usize) -> IncomingMessage {
    IncomingMessage::text(format!("user-{n}"), format!("name-{n}"), format!("message {n}"))
}

pub async fn enqueue_many(buffer: &TestBuffer, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        ids.push(buffer.buffer_message(chat(n)).await.unwrap());
    }
    ids
}

pub fn contents(batch: &[Message]) -> Vec<String> {
    batch.iter().map(|m| m.content().to_string()).collect()
}
