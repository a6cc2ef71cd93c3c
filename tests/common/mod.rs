//! Shared helpers for the WireMock suites.

#![allow(dead_code)]

use integrations_http_client::{ClientConfig, HttpClient, TokenStore};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{MockServer, ResponseTemplate};

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client config pointing at the mock server, with short backoff.
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::builder()
        .base_url(server.uri())
        .retry_delay(Duration::from_millis(10))
        .timeout(Duration::from_secs(2))
        .build()
        .expect("valid config")
}

pub fn client_for(server: &MockServer) -> HttpClient {
    HttpClient::builder()
        .with_config(config_for(server))
        .build()
        .expect("Failed to build client")
}

pub fn authed_client_for(server: &MockServer, store: Arc<dyn TokenStore>) -> HttpClient {
    HttpClient::builder()
        .with_config(config_for(server))
        .with_token_store(store)
        .build()
        .expect("Failed to build client")
}

pub fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

pub async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}
