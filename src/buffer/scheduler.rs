use super::service::MessageBuffer;
use crate::queue::ListStore;
use crate::sender::PersistenceClient;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sending half of the immediate-flush path. Requests never block; while one
/// is pending further requests are absorbed.
#[derive(Debug, Clone)]
pub struct FlushTrigger {
    tx: mpsc::Sender<()>,
}

impl FlushTrigger {
    pub fn request(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => debug!("Scheduler stopped, flush request ignored"),
        }
    }
}

/// Receiving half of the immediate-flush path, consumed by [`BatchScheduler`].
#[derive(Debug)]
pub struct FlushRequests {
    rx: mpsc::Receiver<()>,
}

pub fn flush_channel() -> (FlushTrigger, FlushRequests) {
    let (tx, rx) = mpsc::channel(1);
    (FlushTrigger { tx }, FlushRequests { rx })
}

/// Timer side of the pipeline: a periodic flush plus a debounced immediate
/// flush, both funnelled into [`MessageBuffer::process_batch`].
pub struct BatchScheduler<S, P> {
    buffer: Arc<MessageBuffer<S, P>>,
    requests: Option<FlushRequests>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: ListStore, P: PersistenceClient> BatchScheduler<S, P> {
    pub fn new(buffer: Arc<MessageBuffer<S, P>>, requests: FlushRequests) -> Self {
        Self {
            buffer,
            requests: Some(requests),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.start_periodic();
        self.start_debounced();
    }

    /// Processes a batch every `batch_interval`, first tick one interval
    /// after start.
    pub fn start_periodic(&mut self) {
        let buffer = Arc::clone(&self.buffer);
        let cancel = self.cancel.clone();
        let period = buffer.config().batch_interval;

        self.tasks.push(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Periodic flush every {:?}", period);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        buffer.process_batch().await;
                    }
                }
            }
            debug!("Periodic flush stopped");
        }));
    }

    /// Waits for flush requests, lets the debounce window pass, then
    /// processes one batch for everything requested in the meantime.
    pub fn start_debounced(&mut self) {
        let Some(mut requests) = self.requests.take() else {
            warn!("Debounced flush already started");
            return;
        };
        let buffer = Arc::clone(&self.buffer);
        let cancel = self.cancel.clone();
        let debounce = buffer.config().flush_debounce;

        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    request = requests.rx.recv() => {
                        if request.is_none() {
                            break;
                        }
                    }
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(debounce) => {}
                }
                while requests.rx.try_recv().is_ok() {}

                debug!("Immediate flush");
                buffer.process_batch().await;
            }
            debug!("Immediate flush stopped");
        }));
    }

    pub fn trigger(&self) {
        self.buffer.request_flush();
    }

    /// Stops both timers and waits for their tasks. A batch already being
    /// processed runs to completion first.
    pub async fn cancel_all(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Scheduler task ended abnormally: {e}");
            }
        }
        info!("Batch scheduler stopped");
    }
}

impl<S, P> Drop for BatchScheduler<S, P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
