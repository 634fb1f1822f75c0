//! Upload and download coordinators sharing one auth manager

use std::sync::Arc;
use std::time::Duration;

use oneroll_remote::{AuthManager, HttpClient, MemoryTokenStore};
use oneroll_sync::{RuntimeDispatcher, SyncCoordinator, SyncError};
use serde_json::json;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_coordinators_share_one_enrollment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "uploadToken": "shared" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let auth = Arc::new(AuthManager::new(
        HttpClient::new(),
        Arc::new(MemoryTokenStore::new()),
    ));
    let uploads = Harness::with_auth(&config, auth.clone());
    let downloads = Harness::with_auth(&config, auth.clone());
    let dispatcher = Arc::new(RuntimeDispatcher::current());
    let upload_coordinator = SyncCoordinator::new("uploads", uploads.engine.clone(), dispatcher.clone());
    let download_coordinator = SyncCoordinator::new("downloads", downloads.engine.clone(), dispatcher);

    let file = uploads.dir.path().join("IMG_1.jpg");
    std::fs::write(&file, b"jpeg").unwrap();

    let (up_tx, up_rx) = oneshot::channel();
    let (down_tx, down_rx) = oneshot::channel();
    upload_coordinator.upload_photo(config.clone(), file, move |result| {
        let _ = up_tx.send(result);
    });
    download_coordinator.sync_own_photos(config.clone(), move |result| {
        let _ = down_tx.send(result);
    });

    up_rx.await.unwrap().unwrap();
    let report = down_rx.await.unwrap().unwrap();
    assert_eq!(report.downloaded, 0);
    assert_eq!(auth.cached().await.unwrap().token, "shared");
}

#[tokio::test]
async fn test_failed_upload_is_delivered_as_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/enroll"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "uploadToken": "t" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(413).set_body_string("too large"))
        .expect(1)
        .mount(&server)
        .await;

    let config = broker_config(&server.uri());
    let harness = Harness::new(&config);
    let coordinator = SyncCoordinator::new(
        "uploads",
        harness.engine.clone(),
        Arc::new(RuntimeDispatcher::current()),
    );
    let file = harness.dir.path().join("IMG_1.jpg");
    std::fs::write(&file, b"jpeg").unwrap();

    let (tx, rx) = oneshot::channel();
    coordinator.upload_photo(config, file, move |result| {
        let _ = tx.send(result);
    });

    match rx.await.unwrap() {
        Err(SyncError::Remote(e)) => assert!(e.to_string().contains("too large")),
        other => panic!("unexpected outcome: {other:?}"),
    }
}
