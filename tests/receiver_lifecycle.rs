// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Receiver lifecycle over a real TCP socket.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use otlp_receiver::{OtlpReceiver, ResolvedConfig, StartOutcome};

fn ephemeral() -> ResolvedConfig {
    ResolvedConfig {
        port: 0,
        ..Default::default()
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_serves_over_tcp_until_stopped() {
    let mut receiver = OtlpReceiver::new(ephemeral());
    let addr = match receiver.start().await {
        StartOutcome::Listening(addr) => addr,
        other => panic!("receiver did not start: {:?}", other),
    };
    let base = format!("http://{}", addr);
    let http = client();

    let health: Value = http
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let payload = json!({
        "resourceLogs": [{
            "scopeLogs": [{
                "logRecords": [{
                    "attributes": [
                        { "key": "event.name", "value": { "stringValue": "api_request" } },
                        { "key": "input_tokens", "value": { "intValue": "40" } },
                        { "key": "output_tokens", "value": { "intValue": 2 } }
                    ]
                }]
            }]
        }]
    });
    let response = http
        .post(format!("{}/v1/logs", base))
        .json(&payload)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let status: Value = http
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["totalTokens"], 42);

    let missing = http.get(format!("{}/missing", base)).send().await.unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    receiver.stop().await;
    assert!(!receiver.is_running());
    assert!(http.get(format!("{}/health", base)).send().await.is_err());

    // aggregate survives stop
    assert_eq!(receiver.snapshot().total_tokens, 42);
}

#[tokio::test]
async fn test_port_in_use_does_not_abort() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut receiver = OtlpReceiver::new(ResolvedConfig {
        port,
        ..Default::default()
    });
    let outcome = receiver.start().await;
    assert!(matches!(outcome, StartOutcome::Unavailable { .. }));
    assert!(outcome.addr().is_none());

    // the rest of the API keeps working without a listener
    assert_eq!(receiver.snapshot().total_tokens, 0);
    receiver.reset();
    receiver.stop().await;
}

#[tokio::test]
async fn test_restart_after_stop() {
    let mut receiver = OtlpReceiver::new(ephemeral());
    assert!(receiver.start().await.addr().is_some());
    receiver.stop().await;

    let addr = receiver.start().await.addr().unwrap();
    let response = client()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let env = receiver.exporter_env().unwrap();
    assert!(env
        .iter()
        .any(|(k, v)| *k == "OTEL_EXPORTER_OTLP_ENDPOINT" && *v == format!("http://{}", addr)));
    receiver.stop().await;
}
