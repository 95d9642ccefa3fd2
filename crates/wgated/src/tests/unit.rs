//! End-to-end tests for a bootstrapped daemon.

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use crate::bootstrap::bootstrap_with;
use crate::dispatch::{CorrelationId, OutboundMessage, Privilege};
use crate::handlers::{PING_REQUEST, builtin_registry};
use crate::tests::support::{HealthEvent, RecordingHealthReporter, TestConfigLoader, request};

#[rstest]
#[tokio::test]
async fn bootstrapped_daemon_serves_until_shutdown() {
    let loader = TestConfigLoader::tcp();
    let reporter = Arc::new(RecordingHealthReporter::default());
    let daemon =
        bootstrap_with(&loader, reporter.clone(), builtin_registry()).expect("bootstrap");
    let bound = daemon.bind().await.expect("bind listener");
    let addr = bound.local_addr().expect("tcp address");
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(bound.serve(async move {
        stopped.await.ok();
    }));

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let ping = request(99, PING_REQUEST, Privilege::Session, json!({ "echo": 5 }))
        .with_source("client-1");
    let mut line = serde_json::to_vec(&ping).expect("request encodes");
    line.push(b'\n');
    stream.write_all(&line).await.expect("write request");

    let mut lines = BufReader::new(stream).lines();
    let reply = lines
        .next_line()
        .await
        .expect("read response")
        .expect("response line");
    let response: OutboundMessage = serde_json::from_str(&reply).expect("response decodes");
    assert_eq!(response.correlation_id, CorrelationId::new(99));
    assert_eq!(response.target, "client-1");
    assert!(response.success);

    stop.send(()).expect("server waiting for shutdown");
    server
        .await
        .expect("serve task")
        .expect("listener stops cleanly");

    let events = reporter.events();
    let endpoint = "tcp://127.0.0.1:0".to_owned();
    assert!(events.contains(&HealthEvent::ListenerReady(endpoint.clone())), "{events:?}");
    assert_eq!(events.last(), Some(&HealthEvent::ListenerStopped(endpoint)));
}
