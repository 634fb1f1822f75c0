//! Local photo store adapter (secondary/driven adapter)
//!
//! Implements [`PhotoStore`] using `tokio::fs`.
//!
//! ## Layout
//!
//! ```text
//! {photo_dir}/IMG_....jpg                 own partition
//! {occasion_dir}/{device}/IMG_....jpg     one partition per device
//! {partition}/.incoming/                  downloads in progress
//! ```
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: downloads stream into the partition's `.incoming`
//!   staging directory and are renamed into place. Every regular file in
//!   the partition directory is a photo, whatever its name, so
//!   [`PhotoStore::list_known`] and [`PhotoStore::exists`] always agree.
//! - **Untrusted names**: every file and device name is validated as a
//!   [`PhotoName`] before it touches the filesystem.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use futures_util::StreamExt;
use oneroll_core::domain::{ByteStream, LocalPhotoRecord, Partition, PhotoName};
use oneroll_core::ports::PhotoStore;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

/// Staging directory for partial downloads, inside each partition
const STAGING_DIR: &str = ".incoming";

/// Name for a photo captured now, e.g. `IMG_20240501_183012_045.jpg`
pub fn next_capture_name() -> String {
    capture_name_at(&Local::now())
}

/// Name for a photo captured at `at`
pub fn capture_name_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("IMG_%Y%m%d_%H%M%S_%3f.jpg").to_string()
}

/// Directory-backed [`PhotoStore`]
#[derive(Debug, Clone)]
pub struct LocalPhotoStore {
    photo_dir: PathBuf,
    occasion_dir: PathBuf,
}

impl LocalPhotoStore {
    pub fn new(photo_dir: impl Into<PathBuf>, occasion_dir: impl Into<PathBuf>) -> Self {
        Self {
            photo_dir: photo_dir.into(),
            occasion_dir: occasion_dir.into(),
        }
    }

    pub fn photo_dir(&self) -> &Path {
        &self.photo_dir
    }

    pub fn occasion_dir(&self) -> &Path {
        &self.occasion_dir
    }

    /// Directory holding `partition`
    pub fn partition_dir(&self, partition: &Partition) -> anyhow::Result<PathBuf> {
        match partition {
            Partition::Own => Ok(self.photo_dir.clone()),
            Partition::Device(device) => {
                let device = PhotoName::new(device.as_str())?;
                Ok(self.occasion_dir.join(device.as_str()))
            }
        }
    }

    /// Path a photo named `name` has (or would have) in `partition`
    pub fn photo_path(&self, partition: &Partition, name: &str) -> anyhow::Result<PathBuf> {
        let name = PhotoName::new(name)?;
        if name.as_str() == STAGING_DIR {
            anyhow::bail!("'{}' is reserved for partial downloads", STAGING_DIR);
        }
        Ok(self.partition_dir(partition)?.join(name.as_str()))
    }

    /// Device partitions currently present under the occasion directory
    pub async fn device_partitions(&self) -> anyhow::Result<Vec<Partition>> {
        let mut partitions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.occasion_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(partitions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                partitions.push(Partition::Device(
                    entry.file_name().to_string_lossy().into_owned(),
                ));
            }
        }
        partitions.sort();
        Ok(partitions)
    }
}

#[async_trait]
impl PhotoStore for LocalPhotoStore {
    #[instrument(skip(self), fields(partition = %partition))]
    async fn list_known(&self, partition: &Partition) -> anyhow::Result<HashSet<String>> {
        let dir = self.partition_dir(partition)?;
        let mut known = HashSet::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("partition directory does not exist yet");
                return Ok(known);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot list {}", dir.display()));
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_file() {
                known.insert(name);
            }
        }
        debug!(count = known.len(), "partition listed");
        Ok(known)
    }

    #[instrument(skip(self), fields(partition = %partition))]
    async fn exists(&self, partition: &Partition, name: &str) -> anyhow::Result<bool> {
        let path = self.photo_path(partition, name)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, body), fields(partition = %partition))]
    async fn save(
        &self,
        partition: &Partition,
        name: &str,
        mut body: ByteStream,
    ) -> anyhow::Result<u64> {
        let target = self.photo_path(partition, name)?;
        let staging = self.partition_dir(partition)?.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("cannot create {}", staging.display()))?;
        let tmp_path = staging.join(name);

        debug!(?tmp_path, "streaming to temporary file");
        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            let mut written = 0u64;
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(written)
        }
        .await;

        let written = match written {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                    warn!(?tmp_path, error = %cleanup, "could not remove partial download");
                }
                return Err(e).with_context(|| format!("cannot write {}", target.display()));
            }
        };

        tokio::fs::rename(&tmp_path, &target).await?;
        debug!(bytes = written, "photo saved");
        Ok(written)
    }

    #[instrument(skip(self), fields(partition = %partition))]
    async fn clear(&self, partition: &Partition) -> anyhow::Result<()> {
        let dir = self.partition_dir(partition)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("partition cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("cannot clear {}", dir.display())),
        }
    }

    #[instrument(skip(self), fields(partition = %partition))]
    async fn list_photos(&self, partition: &Partition) -> anyhow::Result<Vec<LocalPhotoRecord>> {
        let dir = self.partition_dir(partition)?;
        let mut photos = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(photos),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_default();
            photos.push(LocalPhotoRecord {
                file_name,
                path: entry.path(),
                size: metadata.len(),
                modified,
            });
        }

        // Newest first; names break ties so the order is stable.
        photos.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(photos)
    }
}
