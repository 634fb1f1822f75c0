//! Remote items, local records and partition addressing

use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

/// Streamed body of a download, consumed by the local store
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// A photo as reported by a remote listing
///
/// Rebuilt from scratch on every listing call; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    /// Backend identifier (broker id, or the file name on WebDAV)
    pub id: String,
    /// Non-empty file name used as the local dedup key
    pub file_name: String,
    /// Device that captured the photo
    pub owner_device_id: String,
    /// Absolute URL or backend-relative reference used to fetch the bytes
    pub download_ref: String,
}

impl RemoteItem {
    /// Creates an item, synthesizing `{id}.jpg` when the name is blank
    pub fn new(
        id: impl Into<String>,
        file_name: Option<String>,
        owner_device_id: impl Into<String>,
        download_ref: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let file_name = file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{id}.jpg"));
        Self {
            id,
            file_name,
            owner_device_id: owner_device_id.into(),
            download_ref: download_ref.into(),
        }
    }
}

/// What a listing call enumerates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListScope {
    /// Photos of a single device
    Device(String),
    /// Photos of every device in the occasion
    Occasion,
}

/// A local photo namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Partition {
    /// This device's own photos
    Own,
    /// Photos pulled from another device (or this one) during an occasion-wide sync
    Device(String),
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Partition::Own => write!(f, "own"),
            Partition::Device(id) => write!(f, "device:{id}"),
        }
    }
}

/// A photo held in a local partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPhotoRecord {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
}
