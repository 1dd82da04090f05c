use super::{ListStore, QueueError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process [`ListStore`].
///
/// Not crash-durable; used for tests and for running the service without a
/// Redis instance. `set_available(false)` simulates a lost connection,
/// `set_writable(key, false)` a store that refuses writes to one list.
#[derive(Debug)]
pub struct MemoryListStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    read_only: Mutex<HashSet<String>>,
    available: AtomicBool,
    connected: AtomicBool,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            read_only: Mutex::new(HashSet::new()),
            available: AtomicBool::new(true),
            connected: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_writable(&self, key: &str, writable: bool) {
        let mut read_only = self.read_only.lock();
        if writable {
            read_only.remove(key);
        } else {
            read_only.insert(key.to_string());
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Copy of the list contents, oldest first.
    pub fn snapshot(&self, key: &str) -> Vec<String> {
        self.lists
            .lock()
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), QueueError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(QueueError::Disconnected);
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(QueueError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, key: &str) -> Result<(), QueueError> {
        self.check()?;
        if self.read_only.lock().contains(key) {
            return Err(QueueError::Unavailable(format!("{key} is read-only")));
        }
        Ok(())
    }
}

impl Default for MemoryListStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ListStore for MemoryListStore {
    async fn push_back(&self, key: &str, item: String) -> Result<(), QueueError> {
        self.check_writable(key)?;
        self.lists
            .lock()
            .entry(key.to_string())
            .or_default()
            .push_back(item);
        Ok(())
    }

    async fn push_front(&self, key: &str, items: Vec<String>) -> Result<(), QueueError> {
        self.check_writable(key)?;
        let mut lists = self.lists.lock();
        let list = lists.entry(key.to_string()).or_default();
        for item in items.into_iter().rev() {
            list.push_front(item);
        }
        Ok(())
    }

    async fn pop_front(&self, key: &str, count: usize) -> Result<Vec<String>, QueueError> {
        self.check()?;
        let mut lists = self.lists.lock();
        let Some(list) = lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let take = count.min(list.len());
        Ok(list.drain(..take).collect())
    }

    async fn length(&self, key: &str) -> Result<usize, QueueError> {
        self.check()?;
        Ok(self.lists.lock().get(key).map_or(0, VecDeque::len))
    }

    async fn ping(&self) -> Result<(), QueueError> {
        self.check()
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
