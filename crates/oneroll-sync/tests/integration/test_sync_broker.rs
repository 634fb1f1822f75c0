//! Sync passes against a broker served by wiremock

use oneroll_core::domain::{ErrorKind, Partition};
use oneroll_core::ports::PhotoStore;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

async fn mount_enroll_sequence(server: &MockServer, tokens: &[&str]) {
    for token in tokens {
        Mock::given(method("POST"))
            .and(path("/api/enroll"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uploadToken": token })))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

fn gallery_item(server: &MockServer, id: &str, owner: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("IMG_{id}.jpg"),
        "deviceId": owner,
        "downloadUrl": format!("{}/files/{id}", server.uri()),
    })
}

async fn mount_file(server: &MockServer, id: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_own_sync_downloads_missing_own_photos() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                gallery_item(&server, "a", DEVICE_ID),
                gallery_item(&server, "b", DEVICE_ID),
                gallery_item(&server, "c", "device-2"),
            ]
        })))
        .mount(&server)
        .await;
    mount_file(&server, "a", b"photo a").await;
    mount_file(&server, "b", b"photo b").await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    std::fs::create_dir_all(harness.dir.path().join("photos")).unwrap();
    std::fs::write(harness.dir.path().join("photos/IMG_a.jpg"), b"already here").unwrap();

    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.skipped, 1);
    assert!(report.is_clean());
    let photos = harness.dir.path().join("photos");
    assert_eq!(std::fs::read(photos.join("IMG_a.jpg")).unwrap(), b"already here");
    assert_eq!(std::fs::read(photos.join("IMG_b.jpg")).unwrap(), b"photo b");
    assert!(!photos.join("IMG_c.jpg").exists());
}

#[tokio::test]
async fn test_listing_unauthorized_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1", "tok-2"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            gallery_item(&server, "a", DEVICE_ID)
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"photo a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(harness.auth.cached().await.unwrap().token, "tok-2");
}

#[tokio::test]
async fn test_second_unauthorized_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "rejected" })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let err = harness.engine.sync_own(&config).await.unwrap_err();

    assert_eq!(err.remote_kind(), Some(ErrorKind::Unauthorized));
}

#[tokio::test]
async fn test_item_unauthorized_is_retried_once() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1", "tok-2"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            gallery_item(&server, "a", DEVICE_ID)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"photo a".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.downloaded, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_single_failing_item_still_succeeds() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            gallery_item(&server, "a", DEVICE_ID)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .respond_with(ResponseTemplate::new(500).set_body_string("disk on fire"))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, Some(ErrorKind::TransportFailure));
    assert!(report.failures[0].message.contains("disk on fire"));
    assert!(!harness.store.exists(&Partition::Own, "IMG_a.jpg").await.unwrap());
}

#[tokio::test]
async fn test_empty_download_body_is_item_failure() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            gallery_item(&server, "a", DEVICE_ID)
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.failures[0].kind, Some(ErrorKind::EmptyBody));
    assert!(harness.store.list_known(&Partition::Own).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_transport_failure_fails_pass() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let err = harness.engine.sync_own(&config).await.unwrap_err();

    assert_eq!(err.remote_kind(), Some(ErrorKind::TransportFailure));
}

#[tokio::test]
async fn test_enroll_failure_fails_pass_with_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(ResponseTemplate::new(500).set_body_string("broker down"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let err = harness.engine.sync_own(&config).await.unwrap_err();

    assert_eq!(err.remote_kind(), Some(ErrorKind::TransportFailure));
    assert!(harness.auth.cached().await.is_none());
}

#[tokio::test]
async fn test_upload_unauthorized_refreshes_once_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uploadToken": "tok-1" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uploadToken": "tok-2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let file = harness.dir.path().join("IMG_1.jpg");
    std::fs::write(&file, b"jpeg bytes").unwrap();

    harness.engine.upload(&config, &file).await.unwrap();

    assert_eq!(harness.auth.cached().await.unwrap().token, "tok-2");
}

#[tokio::test]
async fn test_missing_gallery_is_empty_pass() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_own(&config).await.unwrap();

    assert_eq!(report.downloaded, 0);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_occasion_sync_places_items_by_owner() {
    let server = MockServer::start().await;
    mount_enroll_sequence(&server, &["tok-1"]).await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                gallery_item(&server, "a", DEVICE_ID),
                gallery_item(&server, "b", "device-2"),
                gallery_item(&server, "c", "device-2"),
            ]
        })))
        .mount(&server)
        .await;
    mount_file(&server, "a", b"a").await;
    mount_file(&server, "b", b"b").await;
    mount_file(&server, "c", b"c").await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let report = harness.engine.sync_occasion(&config, None).await.unwrap();

    assert_eq!(report.downloaded, 3);
    let occasion = harness.dir.path().join("occasion");
    assert_eq!(std::fs::read(occasion.join("device-1/IMG_a.jpg")).unwrap(), b"a");
    assert_eq!(std::fs::read(occasion.join("device-2/IMG_b.jpg")).unwrap(), b"b");
    assert_eq!(std::fs::read(occasion.join("device-2/IMG_c.jpg")).unwrap(), b"c");
    assert!(!harness.dir.path().join("photos/IMG_a.jpg").exists());

    // Second pass finds everything present.
    let again = harness.engine.sync_occasion(&config, None).await.unwrap();
    assert_eq!(again.downloaded, 0);
    assert_eq!(again.skipped, 3);
}
