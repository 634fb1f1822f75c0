//! OneRoll Sync - photo synchronization engine
//!
//! Provides:
//! - Own-device and occasion-wide download passes with per-item isolation
//! - Uploads with a single refresh-and-retry on `Unauthorized`
//! - FIFO coordinators delivering results through a caller-chosen dispatcher
//! - The local photo store (partitioned directories, atomic writes)
//!
//! ## Modules
//!
//! - [`engine`] - Listing, diffing and transfer for one sync pass
//! - [`retry`] - The "refresh once, retry once" wrapper
//! - [`worker`] - Sequential worker and callback dispatchers
//! - [`coordinator`] - Queued front end over the engine
//! - [`filesystem`] - Local photo store adapter

pub mod coordinator;
pub mod engine;
pub mod filesystem;
pub mod retry;
pub mod worker;

use std::path::PathBuf;

use oneroll_core::domain::{ErrorKind, RemoteError};
use thiserror::Error;

pub use coordinator::SyncCoordinator;
pub use engine::{remaining_shots, DownloadProgress, ItemFailure, SyncEngine, SyncPhase, SyncReport};
pub use filesystem::LocalPhotoStore;
pub use worker::{callback_channel, CallbackQueue, ChannelDispatcher, Dispatcher, RuntimeDispatcher};

/// Errors surfaced by a sync operation
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing, transfer or authentication against the remote failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The local photo store failed
    #[error("Local store error: {0}")]
    Store(#[source] anyhow::Error),

    /// A local file to upload could not be read
    #[error("Cannot read {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The coordinator no longer accepts work
    #[error("Coordinator is shut down")]
    ShutDown,

    /// The operation panicked before producing a result
    #[error("{operation} panicked: {message}")]
    Panicked {
        operation: &'static str,
        message: String,
    },
}

impl SyncError {
    /// Remote error kind, if this failure came from the remote side
    pub fn remote_kind(&self) -> Option<ErrorKind> {
        match self {
            SyncError::Remote(e) => Some(e.kind()),
            _ => None,
        }
    }
}
