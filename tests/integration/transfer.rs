//! End-to-end transfers over HTTP against a file-backed daemon.

use reqwest::StatusCode;

use trickle_core::chunk::{block_no, payload};
use trickle_core::config::{SourceConfig, SourceKind};
use trickle_core::{ChunkLayout, HEADER_SIZE};
use trickle_services::SyntheticSource;

use crate::{file_source, get, pull_all, put, spawn_daemon, temp_path, test_data, FixedSource};

#[tokio::test]
async fn file_is_delivered_in_order_then_ends() {
    let data = test_data(10_000);
    let daemon = spawn_daemon(file_source(data.clone())).await.unwrap();
    let client = reqwest::Client::new();

    let chunks = pull_all(&client, &daemon.url("/dev-1")).await.unwrap();

    assert_eq!(chunks.len(), 3);
    let sizes: Vec<usize> = chunks.iter().map(|c| c.len() - HEADER_SIZE).collect();
    assert_eq!(sizes, vec![3840, 3840, 2320]);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(block_no(chunk), Some(i as u32));
    }
    let joined: Vec<u8> = chunks.iter().flat_map(|c| payload(c).to_vec()).collect();
    assert_eq!(joined, data);

    // The transaction is gone once the stream ended.
    assert!(daemon.transfer.snapshot().await.active.is_none());
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn configured_file_on_disk_with_small_chunks() {
    let data = test_data(1_000);
    let path = temp_path("small.bin");
    tokio::fs::write(&path, &data).await.unwrap();

    let config = SourceConfig {
        kind: SourceKind::File,
        path: path.clone(),
        ..SourceConfig::default()
    };
    let layout = ChunkLayout::new(HEADER_SIZE + 300).unwrap();
    let source = trickle_services::from_config(&config, layout).await.unwrap();
    let daemon = spawn_daemon(source).await.unwrap();
    let client = reqwest::Client::new();

    let chunks = pull_all(&client, &daemon.url("/dev-1")).await.unwrap();
    let sizes: Vec<usize> = chunks.iter().map(|c| payload(c).len()).collect();
    assert_eq!(sizes, vec![300, 300, 300, 100]);
    let joined: Vec<u8> = chunks.iter().flat_map(|c| payload(c).to_vec()).collect();
    assert_eq!(joined, data);

    daemon.stop().await.unwrap();
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn unacknowledged_chunk_is_resent_unchanged() {
    let daemon = spawn_daemon(file_source(test_data(9_000))).await.unwrap();
    let client = reqwest::Client::new();
    let url = daemon.url("/dev-1");

    let (s1, first) = get(&client, &url).await.unwrap();
    let (s2, again) = get(&client, &url).await.unwrap();
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(first, again);

    assert_eq!(put(&client, &url).await.unwrap(), StatusCode::OK);
    let (_, next) = get(&client, &url).await.unwrap();
    assert_eq!(block_no(&next), Some(1));
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn acknowledge_is_idempotent() {
    let daemon = spawn_daemon(file_source(test_data(9_000))).await.unwrap();
    let client = reqwest::Client::new();
    let url = daemon.url("/dev-1");

    get(&client, &url).await.unwrap();
    assert_eq!(put(&client, &url).await.unwrap(), StatusCode::OK);
    assert_eq!(put(&client, &url).await.unwrap(), StatusCode::OK);

    // A double ack must not skip a chunk.
    let (_, next) = get(&client, &url).await.unwrap();
    assert_eq!(block_no(&next), Some(1));
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn second_device_is_refused_while_a_transfer_is_active() {
    let daemon = spawn_daemon(file_source(test_data(5_000))).await.unwrap();
    let client = reqwest::Client::new();

    let (status, _) = get(&client, &daemon.url("/dev-a")).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&client, &daemon.url("/dev-b")).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(put(&client, &daemon.url("/dev-b")).await.unwrap(), StatusCode::FORBIDDEN);

    let snapshot = daemon.transfer.snapshot().await;
    assert_eq!(snapshot.active.map(|a| a.id), Some("dev-a".to_string()));

    // Once dev-a finishes, the source is drained: dev-b sees the end.
    let rest = pull_all(&client, &daemon.url("/dev-a")).await.unwrap();
    assert_eq!(rest.len(), 2);
    let (status, _) = get(&client, &daemon.url("/dev-b")).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn acknowledge_without_fetch_is_forbidden() {
    let daemon = spawn_daemon(file_source(test_data(100))).await.unwrap();
    let client = reqwest::Client::new();
    assert_eq!(put(&client, &daemon.url("/dev-1")).await.unwrap(), StatusCode::FORBIDDEN);
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn root_path_is_a_bad_request() {
    let daemon = spawn_daemon(file_source(test_data(100))).await.unwrap();
    let client = reqwest::Client::new();

    let (status, _) = get(&client, &daemon.url("/")).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(put(&client, &daemon.url("/")).await.unwrap(), StatusCode::BAD_REQUEST);
    assert!(daemon.transfer.snapshot().await.active.is_none());
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn responses_close_the_connection() {
    let daemon = spawn_daemon(file_source(test_data(100))).await.unwrap();
    let resp = reqwest::get(daemon.url("/dev-1")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["connection"], "close");
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn empty_file_ends_immediately() {
    let daemon = spawn_daemon(file_source(Vec::new())).await.unwrap();
    let client = reqwest::Client::new();
    let (status, _) = get(&client, &daemon.url("/dev-1")).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(daemon.transfer.snapshot().await.active.is_none());
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn synthetic_source_never_runs_dry() {
    let source = SyntheticSource::seeded(7, ChunkLayout::default());
    let daemon = spawn_daemon(Box::new(source)).await.unwrap();
    let client = reqwest::Client::new();
    let url = daemon.url("/bench");

    for expected in 0..20u32 {
        let (status, body) = get(&client, &url).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.len(), ChunkLayout::default().chunk_size());
        assert_eq!(block_no(&body), Some(expected));
        put(&client, &url).await.unwrap();
    }
    daemon.stop().await.unwrap();
}

#[tokio::test]
async fn status_reports_the_active_transaction() {
    let source = FixedSource::new(vec![b"one".to_vec(), b"two".to_vec()]);
    let daemon = spawn_daemon(Box::new(source)).await.unwrap();
    let client = reqwest::Client::new();

    get(&client, &daemon.url("/dev-1")).await.unwrap();
    let status: serde_json::Value = client
        .get(daemon.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["source"], "fixed");
    assert_eq!(status["active"]["id"], "dev-1");
    assert_eq!(status["active"]["awaiting_ack"], true);
    assert_eq!(status["active"]["chunks_sent"], 1);
    assert_eq!(status["active"]["last_chunk_bytes"], 3);
    assert_eq!(
        status["active"]["last_chunk_digest"],
        blake3_hex(b"one").as_str()
    );

    let aborted: serde_json::Value = client
        .delete(daemon.url("/api/transaction"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(aborted["aborted"], "dev-1");

    // A fresh device can start; the stream continues where it left off.
    let (status, body) = get(&client, &daemon.url("/dev-2")).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"two");
    daemon.stop().await.unwrap();
}

fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
