//! Shared HTTP client
//!
//! Wraps `reqwest::Client` with the pieces every backend needs: attaching
//! the credential, turning transport errors into [`RemoteError::Connection`],
//! classifying non-2xx statuses, building endpoint URLs by path-segment
//! append, and turning a response body into a non-empty [`ByteStream`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use oneroll_remote::client::{endpoint, HttpClient};
//! use reqwest::Method;
//! use url::Url;
//!
//! # async fn example() -> Result<(), oneroll_core::domain::RemoteError> {
//! let http = HttpClient::new();
//! let base = Url::parse("https://broker.example.com/api").unwrap();
//! let url = endpoint(&base, ["gallery"])?;
//! let response = http.send("List gallery", http.request(Method::GET, url, None)).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use std::io;

use futures_util::{stream, StreamExt};
use oneroll_core::domain::{ByteStream, Credential, RemoteError};
use reqwest::{header, Client, Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

/// User agent sent with every request
const USER_AGENT: &str = concat!("oneroll/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HttpClient
// ============================================================================

/// HTTP client shared by the auth manager and both backends
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default transport settings
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Creates a client around an existing `reqwest::Client`
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Creates a request builder with the credential attached
    pub fn request(
        &self,
        method: Method,
        url: Url,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header(header::USER_AGENT, USER_AGENT);
        match credential {
            Some(credential) => {
                builder.header(header::AUTHORIZATION, credential.authorization_header())
            }
            None => builder,
        }
    }

    /// Sends the request without looking at the status
    ///
    /// Only connection-level failures are errors here.
    pub async fn execute(
        &self,
        action: &str,
        builder: RequestBuilder,
    ) -> Result<Response, RemoteError> {
        builder
            .send()
            .await
            .map_err(|e| RemoteError::connection(action, e))
    }

    /// Sends the request and fails on any non-2xx status
    pub async fn send(
        &self,
        action: &str,
        builder: RequestBuilder,
    ) -> Result<Response, RemoteError> {
        let response = self.execute(action, builder).await?;
        check_status(action, response).await
    }
}

/// Passes 2xx responses through and classifies everything else
///
/// The response body, when readable, becomes the error message.
pub async fn check_status(action: &str, response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.ok();
    debug!(action, status = status.as_u16(), "Request failed");
    Err(RemoteError::from_status(action, status.as_u16(), message))
}

/// Returns the WebDAV extension method `name`
pub fn dav_method(name: &'static str) -> Result<Method, RemoteError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| RemoteError::Configuration(format!("invalid HTTP method {name}: {e}")))
}

// ============================================================================
// URL helpers
// ============================================================================

/// Appends path segments to `base`, keeping the base path
///
/// Segments are percent-encoded; blank segments are skipped. A trailing
/// slash on `base` does not produce an empty segment.
pub fn endpoint<'a, I>(base: &Url, segments: I) -> Result<Url, RemoteError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            RemoteError::Configuration(format!("{base} cannot be used as an endpoint base"))
        })?;
        path.pop_if_empty();
        for segment in segments {
            let segment = segment.trim_matches('/');
            if !segment.is_empty() {
                path.push(segment);
            }
        }
    }
    Ok(url)
}

/// Returns `url` with a trailing slash on its path
pub fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// ============================================================================
// Body streaming
// ============================================================================

/// Converts a successful response into a [`ByteStream`]
///
/// Reads ahead to the first non-empty chunk so that an empty body is
/// reported as [`RemoteError::EmptyBody`] before anything is written
/// locally.
pub async fn body_stream(action: &str, response: Response) -> Result<ByteStream, RemoteError> {
    let mut body = response.bytes_stream();
    loop {
        match body.next().await {
            None => return Err(RemoteError::EmptyBody(action.to_string())),
            Some(Err(e)) => return Err(RemoteError::connection(action, e)),
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                let rest = body.map(|item| item.map_err(io::Error::other));
                return Ok(stream::once(async move { Ok(chunk) }).chain(rest).boxed());
            }
        }
    }
}
