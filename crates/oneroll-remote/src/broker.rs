//! Broker backend (REST/JSON)
//!
//! - `GET {base}/gallery` lists every photo of the occasion
//! - `POST {base}/upload` takes a multipart form (`file`, `occasionId`, `deviceId`)
//! - downloads follow the item's URL, or `{base}/gallery/{id}`
//!
//! The broker has no folder concept: [`RemoteBackend::has_containers`] is
//! `false` and [`RemoteBackend::ensure_container`] is a no-op.

use std::path::Path;

use async_trait::async_trait;
use oneroll_core::domain::{
    BackendKind, ByteStream, Credential, ListScope, RemoteError, RemoteItem, SyncConfig,
};
use oneroll_core::ports::RemoteBackend;
use reqwest::multipart::{Form, Part};
use reqwest::{header, Body, Method};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;

use crate::client::{body_stream, endpoint, HttpClient};
use crate::gallery::parse_gallery;

const JPEG: &str = "image/jpeg";

/// Broker implementation of [`RemoteBackend`]
#[derive(Debug, Clone, Default)]
pub struct BrokerBackend {
    http: HttpClient,
}

impl BrokerBackend {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Resolves a download reference against the broker base
    ///
    /// Absolute http(s) URLs are used as-is; anything else is appended to
    /// the base path segment by segment. A blank reference addresses
    /// `gallery/{id}`.
    pub fn resolve_download(base: &Url, item: &RemoteItem) -> Result<Url, RemoteError> {
        let candidate = item.download_ref.trim();
        if let Ok(url) = Url::parse(candidate) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(url);
            }
        }
        if candidate.is_empty() {
            return endpoint(base, ["gallery", item.id.as_str()]);
        }
        endpoint(base, candidate.split('/'))
    }
}

#[async_trait]
impl RemoteBackend for BrokerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Broker
    }

    /// The broker keeps one occasion-wide gallery; `scope` does not narrow
    /// the request and owner filtering is left to the caller.
    async fn list(
        &self,
        config: &SyncConfig,
        _scope: &ListScope,
        credential: &Credential,
    ) -> Result<Vec<RemoteItem>, RemoteError> {
        const ACTION: &str = "List gallery";
        let url = endpoint(&config.endpoint_base, ["gallery"])?;
        let request = self
            .http
            .request(Method::GET, url, Some(credential))
            .header(header::ACCEPT, "application/json");

        let response = match self.http.send(ACTION, request).await {
            Ok(response) => response,
            Err(RemoteError::NotFound { .. }) => {
                debug!("Gallery not found, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::connection(ACTION, e))?;

        let items = parse_gallery(&body, &config.endpoint_base);
        debug!(count = items.len(), "Gallery listed");
        Ok(items)
    }

    fn has_containers(&self) -> bool {
        false
    }

    async fn ensure_container(
        &self,
        _config: &SyncConfig,
        _partition: Option<&str>,
        _credential: &Credential,
    ) -> Result<(), RemoteError> {
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

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), length)
            .file_name(file_name.clone())
            .mime_str(JPEG)
            .map_err(|e| RemoteError::Configuration(format!("invalid content type: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("occasionId", config.occasion_id.clone())
            .text("deviceId", config.device_id.clone());

        let url = endpoint(&config.endpoint_base, ["upload"])?;
        self.http
            .send(
                ACTION,
                self.http
                    .request(Method::POST, url, Some(credential))
                    .multipart(form),
            )
            .await?;
        info!(file_name = %file_name, bytes = length, "Uploaded to broker");
        Ok(())
    }

    async fn download(
        &self,
        config: &SyncConfig,
        item: &RemoteItem,
        credential: &Credential,
    ) -> Result<ByteStream, RemoteError> {
        let action = format!("Download {}", item.id);
        let url = Self::resolve_download(&config.endpoint_base, item)?;
        let response = self
            .http
            .send(&action, self.http.request(Method::GET, url, Some(credential)))
            .await?;
        body_stream(&action, response).await
    }
}
