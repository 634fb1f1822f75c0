//! Local photo store port (driven/secondary port)
//!
//! File-name uniqueness within a partition is the only dedup key the sync
//! engine relies on.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::{ByteStream, LocalPhotoRecord, Partition};

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Names of every photo present in `partition`
    async fn list_known(&self, partition: &Partition) -> anyhow::Result<HashSet<String>>;

    /// Whether `name` is present in `partition`
    async fn exists(&self, partition: &Partition, name: &str) -> anyhow::Result<bool>;

    /// Writes `body` as `name`, replacing any previous file atomically
    ///
    /// Returns the number of bytes written.
    async fn save(&self, partition: &Partition, name: &str, body: ByteStream)
        -> anyhow::Result<u64>;

    /// Removes every photo in `partition`
    async fn clear(&self, partition: &Partition) -> anyhow::Result<()>;

    /// Photos in `partition`, newest first
    async fn list_photos(&self, partition: &Partition) -> anyhow::Result<Vec<LocalPhotoRecord>>;
}
