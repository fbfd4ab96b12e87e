//! Upstream failures and contention, seen from the HTTP side.

use std::time::Duration;

use reqwest::StatusCode;
use tokio::net::TcpListener;

use trickle_core::frame::{read_frame, write_frame};
use trickle_core::Frame;
use trickle_services::RelaySource;

use crate::{file_source, get, put, spawn_daemon, test_data};

/// An address nothing listens on.
async fn dead_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

#[tokio::test]
async fn unreachable_relay_is_a_bad_gateway_not_end_of_data() {
    let source = RelaySource::new(dead_addr().await, Duration::from_millis(500));
    let daemon = spawn_daemon(Box::new(source)).await.unwrap();
    let client = reqwest::Client::new();

    let (status, body) = get(&client, &daemon.url("/dev-1")).await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.is_empty());

    // Nothing was opened, so another device is not locked out.
    assert!(daemon.transfer.snapshot().await.active.is_none());
    let (status, _) = get(&client, &daemon.url("/dev-2")).await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn stalled_relay_times_out_and_keeps_the_transaction() {
    // Answers the first `send` with one chunk, then reads and never replies.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let relay = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_frame(&mut stream).await.unwrap();
        write_frame(&mut stream, &Frame::Chunk(bytes::Bytes::from_static(b"first")))
            .await
            .unwrap();
        while let Ok(Some(_)) = read_frame(&mut stream).await {}
    });

    let source = RelaySource::new(addr, Duration::from_millis(200));
    let daemon = spawn_daemon(Box::new(source)).await.unwrap();
    let client = reqwest::Client::new();
    let url = daemon.url("/dev-1");

    let (status, body) = get(&client, &url).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"first");
    assert_eq!(put(&client, &url).await.unwrap(), StatusCode::OK);

    let (status, _) = get(&client, &url).await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    // The failed pull changed nothing: still dev-1, still acknowledged.
    let active = daemon.transfer.snapshot().await.active.unwrap();
    assert_eq!(active.id, "dev-1");
    assert!(!active.awaiting_ack);
    assert_eq!(active.chunks_sent, 1);

    relay.abort();
    // Shutdown's close also fails against a dead relay; it is only logged.
    daemon.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_devices_have_exactly_one_winner() {
    let daemon = spawn_daemon(file_source(test_data(50_000))).await.unwrap();
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for n in 0..8 {
        let client = client.clone();
        let url = daemon.url(&format!("/dev-{n}"));
        tasks.push(tokio::spawn(async move { get(&client, &url).await.unwrap().0 }));
    }
    let mut ok = 0;
    let mut forbidden = 0;
    for task in tasks {
        match task.await.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::FORBIDDEN => forbidden += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!((ok, forbidden), (1, 7));
    assert_eq!(daemon.transfer.snapshot().await.active.unwrap().chunks_sent, 1);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn overlong_id_is_rejected() {
    let daemon = spawn_daemon(file_source(test_data(100))).await.unwrap();
    let client = reqwest::Client::new();
    let long = "x".repeat(200);
    let (status, _) = get(&client, &daemon.url(&format!("/{long}"))).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(daemon.transfer.snapshot().await.active.is_none());
    daemon.stop().await.unwrap();
}
