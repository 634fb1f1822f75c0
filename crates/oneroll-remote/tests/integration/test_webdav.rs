//! WebDAV backend tests: PROPFIND fallback, occasion listing, MKCOL, PUT, GET

use futures_util::StreamExt;
use oneroll_core::domain::{ErrorKind, ListScope};
use oneroll_core::ports::RemoteBackend;
use oneroll_remote::{HttpClient, WebDavBackend};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::*;

const ROOT: &str = "/dav/photos/";
const DEVICE_FOLDER: &str = "/dav/photos/device-1/";

fn backend() -> WebDavBackend {
    WebDavBackend::new(HttpClient::new())
}

#[tokio::test]
async fn test_device_listing_filters_jpegs_and_self_entry() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path(DEVICE_FOLDER))
        .and(header("depth", "1"))
        .and(header("authorization", "Basic Z3Vlc3Q6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[
            (DEVICE_FOLDER, true),
            ("/dav/photos/device-1/IMG_1.jpg", false),
            ("/dav/photos/device-1/IMG_2.JPG", false),
            ("/dav/photos/device-1/notes.txt", false),
            ("/dav/photos/device-1/nested/", true),
        ])))
        .mount(&server)
        .await;

    let items = backend()
        .list(
            &webdav_config(&server),
            &ListScope::Device(DEVICE_ID.to_string()),
            &basic(),
        )
        .await
        .unwrap();

    let names: Vec<_> = items.iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(names, vec!["IMG_1.jpg", "IMG_2.JPG"]);
    assert!(items.iter().all(|i| i.owner_device_id == DEVICE_ID));
    assert_eq!(
        items[0].download_ref,
        format!("{}/dav/photos/device-1/IMG_1.jpg", server.uri())
    );
}

#[tokio::test]
async fn test_propfind_retries_once_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path(DEVICE_FOLDER))
        .and(NoBody)
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path(DEVICE_FOLDER))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(body_string_contains("<d:resourcetype/>"))
        .and(body_string_contains("<d:getcontentlength/>"))
        .respond_with(ResponseTemplate::new(207).set_body_string(multistatus(&[
            ("/dav/photos/device-1/IMG_9.jpg", false),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let items = backend()
        .list(
            &webdav_config(&server),
            &ListScope::Device(DEVICE_ID.to_string()),
            &basic(),
        )
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].file_name, "IMG_9.jpg");
}

#[tokio::test]
async fn test_propfind_failure_after_retry_surfaces_last_error() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let err = backend()
        .list(&webdav_config(&server), &ListScope::Occasion, &basic())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(err.to_string().contains("HTTP 502"));
}

#[tokio::test]
async fn test_propfind_unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend()
        .list(
            &webdav_config(&server),
            &ListScope::Device(DEVICE_ID.to_string()),
            &basic(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_missing_folder_is_empty_listing() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let items = backend()
        .list(
            &webdav_config(&server),
            &ListScope::Device(DEVICE_ID.to_string()),
            &basic(),
        )
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn test_occasion_listing_tags_items_with_folder_owner() {
    let server = MockServer::start().await;
    mount_propfind(
        &server,
        ROOT,
        &[
            (ROOT, true),
            ("/dav/photos/device-1/", true),
            ("/dav/photos/device-2/", true),
            ("/dav/photos/stray.jpg", false),
        ],
    )
    .await;
    mount_propfind(
        &server,
        "/dav/photos/device-1/",
        &[
            ("/dav/photos/device-1/", true),
            ("/dav/photos/device-1/a.jpg", false),
        ],
    )
    .await;
    mount_propfind(
        &server,
        "/dav/photos/device-2/",
        &[
            ("/dav/photos/device-2/", true),
            ("/dav/photos/device-2/b.jpg", false),
            ("/dav/photos/device-2/c.jpg", false),
        ],
    )
    .await;

    let items = backend()
        .list(&webdav_config(&server), &ListScope::Occasion, &basic())
        .await
        .unwrap();
    let tagged: Vec<_> = items
        .iter()
        .map(|i| (i.owner_device_id.as_str(), i.file_name.as_str()))
        .collect();
    assert_eq!(
        tagged,
        vec![("device-1", "a.jpg"), ("device-2", "b.jpg"), ("device-2", "c.jpg")]
    );
}

#[tokio::test]
async fn test_mkcol_treats_405_as_existing() {
    let server = MockServer::start().await;
    Mock::given(method("MKCOL"))
        .and(path(DEVICE_FOLDER))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&server)
        .await;

    backend()
        .ensure_container(&webdav_config(&server), Some(DEVICE_ID), &basic())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mkcol_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("MKCOL"))
        .and(path(ROOT))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = backend()
        .ensure_container(&webdav_config(&server), None, &basic())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(err.to_string().starts_with("MKCOL failed with HTTP 409"));
}

#[tokio::test]
async fn test_put_then_get() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/dav/photos/device-1/IMG_3.jpg"))
        .and(header("content-type", "image/jpeg"))
        .and(body_string_contains("raw-jpeg"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_propfind(
        &server,
        DEVICE_FOLDER,
        &[("/dav/photos/device-1/IMG_3.jpg", false)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/dav/photos/device-1/IMG_3.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw-jpeg".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("IMG_3.jpg");
    std::fs::write(&file, b"raw-jpeg").unwrap();
    let config = webdav_config(&server);

    backend().upload(&config, &file, &basic()).await.unwrap();

    let items = backend()
        .list(&config, &ListScope::Device(DEVICE_ID.to_string()), &basic())
        .await
        .unwrap();
    let stream = backend().download(&config, &items[0], &basic()).await.unwrap();
    let chunks: Vec<_> = stream.collect().await;
    let bytes: Vec<u8> = chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect();
    assert_eq!(bytes, b"raw-jpeg");
}
