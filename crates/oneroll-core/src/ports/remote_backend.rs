//! Remote backend port (driven/secondary port)
//!
//! One capability interface covering listing, container creation and binary
//! transfer. The broker and WebDAV adapters implement it; the sync engine
//! never branches on which one it holds.
//!
//! Errors are [`RemoteError`] rather than `anyhow` because the engine's retry
//! and isolation policies depend on the error kind.

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{
    BackendKind, ByteStream, Credential, ListScope, RemoteError, RemoteItem, SyncConfig,
};

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Which protocol this adapter speaks
    fn kind(&self) -> BackendKind;

    /// Whether [`RemoteBackend::ensure_container`] does anything
    ///
    /// Callers skip the container step (and the credential it needs) when
    /// this is `false`.
    fn has_containers(&self) -> bool {
        true
    }

    /// Returns a full snapshot of the remote items in `scope`
    ///
    /// A 404 on the listed folder yields an empty vector. Unparseable bodies
    /// also degrade to an empty vector.
    async fn list(
        &self,
        config: &SyncConfig,
        scope: &ListScope,
        credential: &Credential,
    ) -> Result<Vec<RemoteItem>, RemoteError>;

    /// Creates the destination container if the protocol has one
    ///
    /// `partition` of `None` addresses the occasion root. "Already exists"
    /// is success.
    async fn ensure_container(
        &self,
        config: &SyncConfig,
        partition: Option<&str>,
        credential: &Credential,
    ) -> Result<(), RemoteError>;

    /// Uploads a local file into this device's remote partition
    async fn upload(
        &self,
        config: &SyncConfig,
        file: &Path,
        credential: &Credential,
    ) -> Result<(), RemoteError>;

    /// Opens a download stream for `item`
    ///
    /// An empty body is [`RemoteError::EmptyBody`].
    async fn download(
        &self,
        config: &SyncConfig,
        item: &RemoteItem,
        credential: &Credential,
    ) -> Result<ByteStream, RemoteError>;
}
