//! Crash-durable FIFO lists.
//!
//! `ListStore` is the raw keyed list primitive (Redis in production),
//! `DurableQueue` binds a store to one fixed key and exposes the
//! enqueue / dequeue-up-to / length contract used by the buffer.

pub mod memory;
pub mod redis_store;

pub use memory::MemoryListStore;
pub use redis_store::RedisListStore;

use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Key of the main message buffer list.
pub const MESSAGE_BUFFER_KEY: &str = "chat:message_buffer";
/// Key of the dead-letter list.
pub const FAILED_MESSAGES_KEY: &str = "chat:failed_messages";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
    #[error("Queue connection has been released")]
    Disconnected,
}

/// Keyed list primitive with atomic push/pop.
///
/// Items are appended at the back and removed from the front, so a push
/// followed by pops observes FIFO order.
pub trait ListStore: Send + Sync + 'static {
    fn push_back(
        &self,
        key: &str,
        item: String,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Inserts `items` at the front so that `items[0]` is popped next.
    fn push_front(
        &self,
        key: &str,
        items: Vec<String>,
    ) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Removes and returns at most `count` items, oldest first.
    fn pop_front(
        &self,
        key: &str,
        count: usize,
    ) -> impl Future<Output = Result<Vec<String>, QueueError>> + Send;

    fn length(&self, key: &str) -> impl Future<Output = Result<usize, QueueError>> + Send;

    fn ping(&self) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Releases the underlying connection. Later calls fail with
    /// [`QueueError::Disconnected`].
    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

/// A [`ListStore`] bound to a single key.
pub struct DurableQueue<S> {
    store: Arc<S>,
    key: String,
}

impl<S> Clone for DurableQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<S: ListStore> DurableQueue<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn enqueue(&self, item: String) -> Result<(), QueueError> {
        self.store.push_back(&self.key, item).await
    }

    /// Puts previously dequeued items back at the head, keeping their order.
    pub async fn requeue_front(&self, items: Vec<String>) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        self.store.push_front(&self.key, items).await
    }

    pub async fn dequeue_up_to(&self, n: usize) -> Result<Vec<String>, QueueError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        self.store.pop_front(&self.key, n).await
    }

    pub async fn length(&self) -> Result<usize, QueueError> {
        self.store.length(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeue_preserves_enqueue_order() {
        let queue = DurableQueue::new(Arc::new(MemoryListStore::new()), MESSAGE_BUFFER_KEY);
        for item in ["a", "b", "c", "d"] {
            queue.enqueue(item.to_string()).await.unwrap();
        }

        assert_eq!(queue.dequeue_up_to(3).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(queue.length().await.unwrap(), 1);
        assert_eq!(queue.dequeue_up_to(10).await.unwrap(), vec!["d"]);
        assert!(queue.dequeue_up_to(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn requeued_items_come_out_first_in_order() {
        let queue = DurableQueue::new(Arc::new(MemoryListStore::new()), MESSAGE_BUFFER_KEY);
        for item in ["a", "b", "c", "d"] {
            queue.enqueue(item.to_string()).await.unwrap();
        }
        let head = queue.dequeue_up_to(2).await.unwrap();
        queue.enqueue("e".to_string()).await.unwrap();

        queue.requeue_front(head).await.unwrap();

        assert_eq!(
            queue.dequeue_up_to(10).await.unwrap(),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[tokio::test]
    async fn queues_on_different_keys_are_independent() {
        let store = Arc::new(MemoryListStore::new());
        let buffer = DurableQueue::new(Arc::clone(&store), MESSAGE_BUFFER_KEY);
        let failed = DurableQueue::new(store, FAILED_MESSAGES_KEY);

        buffer.enqueue("m".to_string()).await.unwrap();

        assert_eq!(buffer.length().await.unwrap(), 1);
        assert_eq!(failed.length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dequeue_zero_does_not_touch_store() {
        let store = Arc::new(MemoryListStore::new());
        let queue = DurableQueue::new(Arc::clone(&store), MESSAGE_BUFFER_KEY);
        queue.enqueue("x".to_string()).await.unwrap();
        store.set_available(false);

        assert!(queue.dequeue_up_to(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_error() {
        let store = Arc::new(MemoryListStore::new());
        let queue = DurableQueue::new(Arc::clone(&store), MESSAGE_BUFFER_KEY);
        queue.enqueue("kept".to_string()).await.unwrap();
        store.set_available(false);

        assert!(matches!(
            queue.enqueue("lost?".to_string()).await,
            Err(QueueError::Unavailable(_))
        ));
        assert!(queue.dequeue_up_to(1).await.is_err());

        store.set_available(true);
        assert_eq!(queue.dequeue_up_to(5).await.unwrap(), vec!["kept"]);
    }
}
