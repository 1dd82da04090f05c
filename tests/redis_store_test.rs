//! Runs against a live Redis: `REDIS_URL=redis://127.0.0.1:6379/15 cargo test -- --ignored`

use chat_buffer::queue::{DurableQueue, ListStore, QueueError, RedisListStore};
use std::sync::Arc;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/15".to_string())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn list_operations_are_fifo() {
    let store = Arc::new(RedisListStore::connect(&redis_url()).await.unwrap());
    store.ping().await.unwrap();

    let key = format!("chat:test:{}", uuid::Uuid::new_v4());
    let queue = DurableQueue::new(Arc::clone(&store), key.clone());
    for n in 0..5 {
        queue.enqueue(format!("item-{n}")).await.unwrap();
    }
    assert_eq!(queue.length().await.unwrap(), 5);

    assert_eq!(queue.dequeue_up_to(3).await.unwrap(), vec!["item-0", "item-1", "item-2"]);
    assert_eq!(queue.dequeue_up_to(10).await.unwrap(), vec!["item-3", "item-4"]);
    assert!(queue.dequeue_up_to(10).await.unwrap().is_empty());
    assert_eq!(queue.length().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn disconnected_store_refuses_commands() {
    let store = RedisListStore::connect(&redis_url()).await.unwrap();
    store.disconnect().await;

    assert_eq!(store.ping().await, Err(QueueError::Disconnected));
}
