//! OneRoll Remote - broker and WebDAV protocol adapters
//!
//! Provides async adapters for:
//! - Broker enrollment and bearer token lifecycle
//! - Gallery listing, multipart upload and download against the broker
//! - PROPFIND listing, MKCOL, PUT and GET against a WebDAV server
//!
//! ## Modules
//!
//! - [`auth`] - AuthManager, enrollment parsing and token stores
//! - [`client`] - Shared HTTP client and status classification
//! - [`broker`] - Broker implementation of `RemoteBackend`
//! - [`gallery`] - Tolerant gallery listing parser
//! - [`webdav`] - WebDAV implementation of `RemoteBackend`
//! - [`multistatus`] - PROPFIND multistatus parser

pub mod auth;
pub mod broker;
pub mod client;
pub mod gallery;
pub mod multistatus;
pub mod webdav;

use std::sync::Arc;

use oneroll_core::domain::BackendKind;
use oneroll_core::ports::RemoteBackend;

pub use auth::{AuthManager, FileTokenStore, KeyringTokenStore, MemoryTokenStore};
pub use broker::BrokerBackend;
pub use client::HttpClient;
pub use webdav::WebDavBackend;

/// Builds the backend for `kind`, sharing `http`'s connection pool
pub fn backend_for(kind: BackendKind, http: HttpClient) -> Arc<dyn RemoteBackend> {
    match kind {
        BackendKind::Broker => Arc::new(BrokerBackend::new(http)),
        BackendKind::WebDav => Arc::new(WebDavBackend::new(http)),
    }
}
