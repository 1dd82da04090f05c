use chat_buffer::domain::{IncomingMessage, Message};
use chat_buffer::sender::{ClientConfig, HttpPersistenceClient, PersistError, PersistenceClient};
use serde_json::Value;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, timeout: Duration) -> HttpPersistenceClient {
    HttpPersistenceClient::new(ClientConfig {
        backend_url: server.uri(),
        timeout,
        service_name: "chat-buffer-test".to_string(),
        ..Default::default()
    })
    .unwrap()
}

fn batch() -> Vec<Message> {
    vec![
        Message::stamp(IncomingMessage::text("u1", "alice", "hello")),
        Message::stamp(IncomingMessage::text("u2", "bob", "hi there")),
    ]
}

#[tokio::test]
async fn posts_batch_with_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/chat/messages/batch"))
        .and(header("content-type", "application/json"))
        .and(header("x-service-name", "chat-buffer-test"))
        .and(header("x-batch-size", "2"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Duration::from_secs(5));
    client.save(&batch()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["userId"], "u1");
    assert_eq!(messages[0]["content"], "hello");
    assert_eq!(messages[1]["username"], "bob");
    assert!(messages[1]["timestamp"].is_string());
}

#[tokio::test]
async fn non_success_status_is_an_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
        .mount(&server)
        .await;

    let err = client_for(&server, Duration::from_secs(5))
        .save(&batch())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        PersistError::Status {
            status: 500,
            body: "database offline".to_string()
        }
    );
}

#[tokio::test]
async fn slow_store_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client_for(&server, Duration::from_millis(200))
        .save(&batch())
        .await
        .unwrap_err();

    assert!(matches!(err, PersistError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_store_is_a_transport_error() {
    let client = HttpPersistenceClient::new(ClientConfig {
        backend_url: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
        connection_timeout: Duration::from_secs(1),
        ..Default::default()
    })
    .unwrap();

    let err = client.save(&batch()).await.unwrap_err();
    assert!(matches!(err, PersistError::Transport(_)), "got {err:?}");
}
