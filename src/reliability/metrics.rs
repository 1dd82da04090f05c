#[cfg(feature = "metrics")]
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[cfg(feature = "metrics")]
    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),
    #[error("Metrics encoding error: {0}")]
    EncodingError(String),
}

#[cfg(feature = "metrics")]
struct Collectors {
    registry: Registry,
    messages_buffered: IntCounter,
    messages_persisted: IntCounter,
    malformed_dropped: IntCounter,
    persist_attempts: IntCounterVec,
    batches: IntCounterVec,
    replays: IntCounterVec,
}

#[cfg(feature = "metrics")]
impl Collectors {
    fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let messages_buffered = IntCounter::new(
            "chat_buffer_messages_buffered_total",
            "Messages accepted into the durable buffer",
        )?;
        let messages_persisted = IntCounter::new(
            "chat_buffer_messages_persisted_total",
            "Messages confirmed by the chat store",
        )?;
        let malformed_dropped = IntCounter::new(
            "chat_buffer_malformed_dropped_total",
            "Buffered items dropped because they did not parse",
        )?;
        let persist_attempts = IntCounterVec::new(
            Opts::new(
                "chat_buffer_persist_attempts_total",
                "Single persistence attempts by result",
            ),
            &["result"], // success, failure
        )?;
        let batches = IntCounterVec::new(
            Opts::new("chat_buffer_batches_total", "Processed batches by outcome"),
            &["outcome"], // persisted, dead_lettered, dead_letter_failed
        )?;
        let replays = IntCounterVec::new(
            Opts::new(
                "chat_buffer_dead_letter_replays_total",
                "Manual dead-letter replays by result",
            ),
            &["result"],
        )?;

        registry.register(Box::new(messages_buffered.clone()))?;
        registry.register(Box::new(messages_persisted.clone()))?;
        registry.register(Box::new(malformed_dropped.clone()))?;
        registry.register(Box::new(persist_attempts.clone()))?;
        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(replays.clone()))?;

        Ok(Self {
            registry,
            messages_buffered,
            messages_persisted,
            malformed_dropped,
            persist_attempts,
            batches,
            replays,
        })
    }
}

/// Buffer counters, exported in Prometheus text format when the `metrics`
/// feature is on. A disabled instance accepts every call and records nothing.
#[derive(Clone, Default)]
pub struct BufferMetrics {
    #[cfg(feature = "metrics")]
    collectors: Option<Arc<Collectors>>,
}

impl BufferMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        #[cfg(feature = "metrics")]
        {
            Ok(Self {
                collectors: Some(Arc::new(Collectors::new()?)),
            })
        }
        #[cfg(not(feature = "metrics"))]
        {
            Ok(Self::default())
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn record_buffered(&self) {
        #[cfg(feature = "metrics")]
        if let Some(c) = &self.collectors {
            c.messages_buffered.inc();
        }
    }

    pub fn record_persist_attempt(&self, success: bool) {
        #[cfg(feature = "metrics")]
        if let Some(c) = &self.collectors {
            let result = if success { "success" } else { "failure" };
            c.persist_attempts.with_label_values(&[result]).inc();
        }
        #[cfg(not(feature = "metrics"))]
        let _ = success;
    }

    pub fn record_batch(&self, outcome: &str, messages: usize) {
        #[cfg(feature = "metrics")]
        if let Some(c) = &self.collectors {
            c.batches.with_label_values(&[outcome]).inc();
            if outcome == "persisted" {
                c.messages_persisted.inc_by(messages as u64);
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (outcome, messages);
    }

    pub fn record_malformed(&self, count: usize) {
        #[cfg(feature = "metrics")]
        if let Some(c) = &self.collectors {
            c.malformed_dropped.inc_by(count as u64);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = count;
    }

    pub fn record_replay(&self, success: bool) {
        #[cfg(feature = "metrics")]
        if let Some(c) = &self.collectors {
            let result = if success { "success" } else { "failure" };
            c.replays.with_label_values(&[result]).inc();
        }
        #[cfg(not(feature = "metrics"))]
        let _ = success;
    }

    /// Prometheus text exposition, or `None` when metrics are disabled.
    pub fn render(&self) -> Option<Result<String, MetricsError>> {
        #[cfg(feature = "metrics")]
        {
            let c = self.collectors.as_ref()?;
            let mut buffer = Vec::new();
            let encoded = TextEncoder::new()
                .encode(&c.registry.gather(), &mut buffer)
                .map_err(MetricsError::from)
                .and_then(|()| {
                    String::from_utf8(buffer)
                        .map_err(|e| MetricsError::EncodingError(e.to_string()))
                });
            Some(encoded)
        }
        #[cfg(not(feature = "metrics"))]
        {
            None
        }
    }
}
