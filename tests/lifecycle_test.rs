mod common;

use chat_buffer::Config;
use chat_buffer::app::ServiceManager;
use chat_buffer::queue::{MESSAGE_BUFFER_KEY, MemoryListStore};
use common::{RecordingClient, chat, contents};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn test_config() -> Config {
    Config {
        http_host: "127.0.0.1".to_string(),
        http_port: 0,
        batch_interval_ms: 60_000,
        ..Config::default()
    }
}

#[tokio::test]
async fn shutdown_drains_once_and_disconnects() {
    let store = Arc::new(MemoryListStore::new());
    let client = Arc::new(RecordingClient::succeeding());
    let manager =
        ServiceManager::from_parts(test_config(), Arc::clone(&store), Arc::clone(&client)).unwrap();
    let buffer = Arc::clone(manager.buffer());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(manager.serve(listener, shutdown.clone()));

    for n in 0..3 {
        buffer.buffer_message(chat(n)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(client.persisted().is_empty());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let persisted = client.persisted();
    assert_eq!(persisted.len(), 1);
    assert_eq!(contents(&persisted[0]), vec!["message 0", "message 1", "message 2"]);
    assert!(!store.is_connected());
}

#[tokio::test]
async fn shutdown_leaves_excess_messages_durable() {
    let store = Arc::new(MemoryListStore::new());
    let client = Arc::new(RecordingClient::succeeding());
    let config = Config {
        batch_size: 2,
        ..test_config()
    };
    let manager =
        ServiceManager::from_parts(config, Arc::clone(&store), Arc::clone(&client)).unwrap();
    let buffer = Arc::clone(manager.buffer());

    // Queue more than one batch before the scheduler starts.
    for n in 0..5 {
        buffer.buffer_message(chat(n)).await.unwrap();
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    manager.serve(listener, shutdown).await.unwrap();

    let persisted: usize = client.persisted().iter().map(Vec::len).sum();
    let remaining = store.snapshot(MESSAGE_BUFFER_KEY).len();
    assert_eq!(persisted + remaining, 5);
    assert!(remaining > 0);
}

#[tokio::test]
async fn serves_ingestion_over_tcp() {
    let store = Arc::new(MemoryListStore::new());
    let client = Arc::new(RecordingClient::succeeding());
    let manager =
        ServiceManager::from_parts(test_config(), Arc::clone(&store), Arc::clone(&client)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let running = tokio::spawn(manager.serve(listener, shutdown.clone()));

    let response = reqwest::Client::new()
        .post(format!("http://{address}/api/v1/messages"))
        .json(&serde_json::json!({ "userId": "7", "username": "g", "content": "over tcp" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

    shutdown.cancel();
    running.await.unwrap().unwrap();

    assert_eq!(contents(&client.persisted()[0]), vec!["over tcp"]);
}
