//! WebDAV backend (HTTP + basic auth)
//!
//! Layout on the server:
//!
//! ```text
//! {base}{prefix}/              occasion root
//! {base}{prefix}/{device}/     one folder per device
//! {base}{prefix}/{device}/IMG_....jpg
//! ```
//!
//! Listing uses `PROPFIND` with `Depth: 1`. Servers disagree on whether a
//! request body is required, so the request is sent without one first and
//! retried once with a minimal `resourcetype`/`getcontentlength` body.

use std::path::Path;

use async_trait::async_trait;
use oneroll_core::domain::newtypes::has_jpeg_suffix;
use oneroll_core::domain::{
    BackendKind, ByteStream, Credential, ListScope, RemoteError, RemoteItem, SyncConfig,
};
use oneroll_core::ports::RemoteBackend;
use reqwest::{header, Body, Method, StatusCode};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{
    body_stream, check_status, dav_method, endpoint, with_trailing_slash, HttpClient,
};
use crate::multistatus::{href_path, parse_multistatus, DavEntry};

const JPEG: &str = "image/jpeg";

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:getcontentlength/>
  </d:prop>
</d:propfind>"#;

/// WebDAV implementation of [`RemoteBackend`]
#[derive(Debug, Clone, Default)]
pub struct WebDavBackend {
    http: HttpClient,
}

impl WebDavBackend {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// URL of the occasion root (`None`) or a device folder, with trailing slash
    pub fn folder_url(config: &SyncConfig, device: Option<&str>) -> Result<Url, RemoteError> {
        let segments = config.prefix_segments().into_iter().chain(device);
        endpoint(&config.endpoint_base, segments).map(with_trailing_slash)
    }

    fn file_url(folder: &Url, name: &str) -> Result<Url, RemoteError> {
        endpoint(folder, [name])
    }

    /// Lists the direct children of `folder`, excluding the folder itself
    ///
    /// A 404 on either attempt means the folder does not exist yet and
    /// yields an empty listing. Unauthorized is returned immediately. A body
    /// that does not parse also yields an empty listing.
    async fn propfind(
        &self,
        folder: &Url,
        credential: &Credential,
    ) -> Result<Vec<DavEntry>, RemoteError> {
        const ACTION: &str = "PROPFIND";
        let propfind = dav_method("PROPFIND")?;
        let mut last_error = None;

        for with_body in [false, true] {
            let mut request = self
                .http
                .request(propfind.clone(), folder.clone(), Some(credential))
                .header("Depth", "1");
            if with_body {
                request = request
                    .header(header::CONTENT_TYPE, "text/xml; charset=utf-8")
                    .body(PROPFIND_BODY);
            }

            let response = match self.http.send(ACTION, request).await {
                Ok(response) => response,
                Err(RemoteError::NotFound { .. }) => {
                    debug!(folder = %folder, "Folder not found, treating as empty");
                    return Ok(Vec::new());
                }
                Err(e) if e.is_unauthorized() => return Err(e),
                Err(e) => {
                    debug!(folder = %folder, with_body, error = %e, "PROPFIND attempt failed");
                    last_error = Some(e);
                    continue;
                }
            };

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = Some(RemoteError::connection(ACTION, e));
                    continue;
                }
            };
            if body.trim().is_empty() {
                return Ok(Vec::new());
            }
            let entries = match parse_multistatus(&body) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(folder = %folder, error = %e, "Unparseable multistatus, treating as empty");
                    return Ok(Vec::new());
                }
            };
            let own_path = href_path(folder.as_str());
            return Ok(entries
                .into_iter()
                .filter(|entry| entry.path != own_path)
                .collect());
        }

        Err(last_error.unwrap_or_else(|| {
            RemoteError::MalformedResponse("PROPFIND produced no response".to_string())
        }))
    }

    /// Lists the photos of one device folder
    async fn list_device(
        &self,
        folder: &Url,
        device: &str,
        credential: &Credential,
    ) -> Result<Vec<RemoteItem>, RemoteError> {
        let mut items = Vec::new();
        for entry in self.propfind(folder, credential).await? {
            if entry.is_collection || !has_jpeg_suffix(&entry.name) {
                continue;
            }
            let url = Self::file_url(folder, &entry.name)?;
            items.push(RemoteItem::new(
                entry.name.clone(),
                Some(entry.name),
                device,
                url.to_string(),
            ));
        }
        Ok(items)
    }
}

#[async_trait]
impl RemoteBackend for WebDavBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::WebDav
    }

    async fn list(
        &self,
        config: &SyncConfig,
        scope: &ListScope,
        credential: &Credential,
    ) -> Result<Vec<RemoteItem>, RemoteError> {
        match scope {
            ListScope::Device(device) => {
                let folder = Self::folder_url(config, Some(device.as_str()))?;
                self.list_device(&folder, device, credential).await
            }
            ListScope::Occasion => {
                let root = Self::folder_url(config, None)?;
                let devices: Vec<String> = self
                    .propfind(&root, credential)
                    .await?
                    .into_iter()
                    .filter(|entry| entry.is_collection)
                    .map(|entry| entry.name)
                    .collect();
                debug!(count = devices.len(), "Device folders discovered");

                let mut items = Vec::new();
                for device in devices {
                    let folder = Self::folder_url(config, Some(device.as_str()))?;
                    items.extend(self.list_device(&folder, &device, credential).await?);
                }
                Ok(items)
            }
        }
    }

    async fn ensure_container(
        &self,
        config: &SyncConfig,
        partition: Option<&str>,
        credential: &Credential,
    ) -> Result<(), RemoteError> {
        const ACTION: &str = "MKCOL";
        let folder = Self::folder_url(config, partition)?;
        let response = self
            .http
            .execute(
                ACTION,
                self.http
                    .request(dav_method("MKCOL")?, folder.clone(), Some(credential)),
            )
            .await?;
        if response.status() == StatusCode::METHOD_NOT_ALLOWED {
            debug!(folder = %folder, "Folder already exists");
            return Ok(());
        }
        check_status(ACTION, response).await?;
        info!(folder = %folder, "Created folder");
        Ok(())
    }

    async fn upload(
        &self,
        config: &SyncConfig,
        file: &Path,
        credential: &Credential,
    ) -> Result<(), RemoteError> {
        const ACTION: &str = "Upload";
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RemoteError::Configuration(format!("{} has no file name", file.display()))
            })?;
        let handle = tokio::fs::File::open(file).await.map_err(|e| {
            RemoteError::Configuration(format!("cannot read {}: {e}", file.display()))
        })?;
        let length = handle
            .metadata()
            .await
            .map_err(|e| RemoteError::Configuration(format!("cannot stat {}: {e}", file.display())))?
            .len();

        let folder = Self::folder_url(config, Some(config.device_id.as_str()))?;
        let url = Self::file_url(&folder, &file_name)?;
        let request = self
            .http
            .request(Method::PUT, url, Some(credential))
            .header(header::CONTENT_TYPE, JPEG)
            .header(header::CONTENT_LENGTH, length)
            .body(Body::wrap_stream(ReaderStream::new(handle)));
        self.http.send(ACTION, request).await?;
        info!(file_name = %file_name, bytes = length, "Uploaded to WebDAV");
        Ok(())
    }

    async fn download(
        &self,
        _config: &SyncConfig,
        item: &RemoteItem,
        credential: &Credential,
    ) -> Result<ByteStream, RemoteError> {
        let action = format!("Download {}/{}", item.owner_device_id, item.file_name);
        let url = Url::parse(&item.download_ref).map_err(|e| {
            RemoteError::MalformedResponse(format!("bad download URL {}: {e}", item.download_ref))
        })?;
        let response = self
            .http
            .send(&action, self.http.request(Method::GET, url, Some(credential)))
            .await?;
        body_stream(&action, response).await
    }
}
