//! Broker backend tests: gallery shapes, multipart upload, download

use futures_util::StreamExt;
use oneroll_core::domain::{ErrorKind, ListScope};
use oneroll_core::ports::RemoteBackend;
use oneroll_remote::{BrokerBackend, HttpClient};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

fn backend() -> BrokerBackend {
    BrokerBackend::new(HttpClient::new())
}

async fn mount_gallery(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_gallery_shapes_yield_identical_items() {
    let entries = json!([
        {"id": "1", "name": "a.jpg", "deviceId": "device-1"},
        {"uploadId": "2", "fileName": "b.jpg", "device": "device-2", "url": "https://cdn.example.com/2"}
    ]);

    let mut results = Vec::new();
    for body in [
        entries.clone(),
        json!({ "items": entries.clone() }),
        json!({ "files": entries.clone() }),
        json!({ "data": entries.clone() }),
    ] {
        let server = MockServer::start().await;
        mount_gallery(&server, body).await;
        let items = backend()
            .list(&broker_config(&server), &ListScope::Occasion, &bearer("tok"))
            .await
            .unwrap();
        let normalized: Vec<_> = items
            .into_iter()
            .map(|i| (i.id, i.file_name, i.owner_device_id))
            .collect();
        results.push(normalized);
    }

    assert_eq!(results[0].len(), 2);
    assert!(results.iter().all(|r| r == &results[0]));
}

#[tokio::test]
async fn test_missing_download_url_points_at_gallery() {
    let server = MockServer::start().await;
    mount_gallery(&server, json!([{"id": "77"}])).await;

    let items = backend()
        .list(&broker_config(&server), &ListScope::Occasion, &bearer("tok"))
        .await
        .unwrap();
    assert_eq!(items[0].file_name, "77.jpg");
    assert_eq!(items[0].owner_device_id, "unknown");
    assert_eq!(items[0].download_ref, format!("{}/api/gallery/77", server.uri()));
}

#[tokio::test]
async fn test_gallery_status_handling() {
    let server = MockServer::start().await;
    let config = broker_config(&server);

    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy page</html>"))
        .mount(&server)
        .await;

    let empty = backend()
        .list(&config, &ListScope::Occasion, &bearer("tok"))
        .await
        .unwrap();
    assert!(empty.is_empty());

    let err = backend()
        .list(&config, &ListScope::Occasion, &bearer("tok"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(err.to_string(), "List gallery failed with HTTP 401 (unauthorized)");

    let malformed = backend()
        .list(&config, &ListScope::Occasion, &bearer("tok"))
        .await
        .unwrap();
    assert!(malformed.is_empty());
}

#[tokio::test]
async fn test_upload_sends_multipart_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer tok"))
        .and(body_string_contains("name=\"file\"; filename=\"IMG_1.jpg\""))
        .and(body_string_contains("image/jpeg"))
        .and(body_string_contains("name=\"occasionId\""))
        .and(body_string_contains(OCCASION_ID))
        .and(body_string_contains("name=\"deviceId\""))
        .and(body_string_contains("jpeg-bytes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("IMG_1.jpg");
    std::fs::write(&file, b"jpeg-bytes").unwrap();

    backend()
        .upload(&broker_config(&server), &file, &bearer("tok"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_upload_unauthorized_and_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("IMG_2.jpg");
    std::fs::write(&file, b"x").unwrap();
    let config = broker_config(&server);

    let err = backend().upload(&config, &file, &bearer("tok")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = backend().upload(&config, &file, &bearer("tok")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert_eq!(err.to_string(), "Upload failed with HTTP 500: quota exceeded");
}

#[tokio::test]
async fn test_download_streams_body_and_rejects_empty() {
    let server = MockServer::start().await;
    mount_gallery(&server, json!([{"id": "full"}, {"id": "empty"}])).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery/full"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xff\xd8photo".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery/empty"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = broker_config(&server);
    let items = backend()
        .list(&config, &ListScope::Occasion, &bearer("tok"))
        .await
        .unwrap();

    let mut stream = backend()
        .download(&config, &items[0], &bearer("tok"))
        .await
        .unwrap();
    let mut bytes = Vec::new();
    while let Some(chunk) = stream.next().await {
        bytes.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(bytes, b"\xff\xd8photo");

    let err = backend()
        .download(&config, &items[1], &bearer("tok"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::EmptyBody);
}

#[tokio::test]
async fn test_ensure_container_is_noop() {
    let server = MockServer::start().await;
    backend()
        .ensure_container(&broker_config(&server), Some(DEVICE_ID), &bearer("tok"))
        .await
        .unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());
}
