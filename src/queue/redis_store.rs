use super::{ListStore, QueueError};
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::Unavailable(err.to_string())
    }
}

/// [`ListStore`] backed by Redis lists.
///
/// Uses `RPUSH` to append and `LPOP key count` to remove, so the pair is FIFO.
/// `LPUSH` returns items to the head.
/// Reconnection after a dropped connection is left to the
/// [`ConnectionManager`].
pub struct RedisListStore {
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisListStore {
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        info!("Connected to Redis queue store");

        Ok(Self {
            connection: Mutex::new(Some(manager)),
        })
    }

    // The manager is a cheap handle onto one multiplexed connection; clone it
    // out so the lock is never held across an await.
    fn connection(&self) -> Result<ConnectionManager, QueueError> {
        self.connection.lock().clone().ok_or(QueueError::Disconnected)
    }
}

impl ListStore for RedisListStore {
    async fn push_back(&self, key: &str, item: String) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        redis::cmd("RPUSH")
            .arg(key)
            .arg(item)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn push_front(&self, key: &str, items: Vec<String>) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        // LPUSH inserts left to right, so the last argument ends up first.
        redis::cmd("LPUSH")
            .arg(key)
            .arg(items.into_iter().rev().collect::<Vec<_>>())
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn pop_front(&self, key: &str, count: usize) -> Result<Vec<String>, QueueError> {
        let mut conn = self.connection()?;
        let items = redis::cmd("LPOP")
            .arg(key)
            .arg(count)
            .query_async::<Option<Vec<String>>>(&mut conn)
            .await?
            .unwrap_or_default();
        debug!(key, popped = items.len(), "Popped items from Redis list");
        Ok(items)
    }

    async fn length(&self, key: &str) -> Result<usize, QueueError> {
        let mut conn = self.connection()?;
        Ok(redis::cmd("LLEN").arg(key).query_async::<usize>(&mut conn).await?)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.connection()?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connection.lock().take().is_some() {
            info!("Released Redis queue connection");
        }
    }
}
