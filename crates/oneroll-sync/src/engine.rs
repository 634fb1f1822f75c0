//! Photo synchronization engine
//!
//! One [`SyncEngine`] drives a sync pass end to end: listing, diffing
//! against the local store, then transferring what is missing.
//!
//! ## Sync Flow
//!
//! ```text
//! Listing ──(Unauthorized)──→ Refreshing ──→ Listing (once)
//!    │
//!    ▼
//! Diffing ──→ Transferring[per item] ──(Unauthorized)──→ Refreshing ──→ retry item (once)
//!    │
//!    ▼
//! Done | Failed
//! ```
//!
//! ## Failure isolation
//!
//! A listing failure aborts the pass. A failed item is logged, recorded in
//! the [`SyncReport`] and the batch continues with the next item.
//!
//! ## Dedup
//!
//! A file name already present in the target partition is never fetched
//! again. Content is not compared.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use oneroll_core::domain::newtypes::is_safe_segment;
use oneroll_core::domain::{
    ErrorKind, ListScope, Partition, RemoteError, RemoteItem, SyncConfig,
};
use oneroll_core::ports::{Authenticator, PhotoStore, RemoteBackend};
use tracing::{debug, info, warn};

use crate::retry::with_reauth;
use crate::SyncError;

// ============================================================================
// Phases and reports
// ============================================================================

/// Stage of a sync pass, logged as the `phase` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Listing,
    Refreshing,
    Diffing,
    Transferring,
    Done,
    Failed,
}

impl Display for SyncPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Listing => "listing",
            SyncPhase::Refreshing => "refreshing",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Transferring => "transferring",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An item that could not be brought into its partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub partition: Partition,
    pub file_name: String,
    /// Remote error kind, `None` for local store failures
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// Outcome of a download pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items newly saved locally
    pub downloaded: u32,
    /// Items already present locally, or gone from the remote
    pub skipped: u32,
    /// Items whose transfer failed; the pass continued past them
    pub failures: Vec<ItemFailure>,
    /// Partitions visited, in order
    pub partitions: Vec<Partition>,
}

impl SyncReport {
    /// Returns true if no item failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Emitted after every successful download of an occasion-wide pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub partition: Partition,
    pub file_name: String,
    /// Downloads completed so far in this pass
    pub downloaded: u32,
}

/// Progress observer for occasion-wide passes
pub type ProgressFn = dyn Fn(DownloadProgress) + Send + Sync;

// ============================================================================
// SyncEngine
// ============================================================================

/// Listing, diffing and transfer against one remote backend
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct SyncEngine {
    backend: Arc<dyn RemoteBackend>,
    auth: Arc<dyn Authenticator>,
    store: Arc<dyn PhotoStore>,
}

impl SyncEngine {
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        auth: Arc<dyn Authenticator>,
        store: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            backend,
            auth,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn PhotoStore> {
        &self.store
    }

    /// Downloads this device's own photos that are missing locally
    ///
    /// The device folder is created first where the backend has folders;
    /// failing to create it is logged and does not stop the pass. Backends
    /// without folders go straight to the listing, so a broken enrollment
    /// is attempted once per pass, not twice.
    pub async fn sync_own(&self, config: &SyncConfig) -> Result<SyncReport, SyncError> {
        info!(
            device_id = %config.device_id,
            backend = %self.backend.kind(),
            "Starting own-photo sync"
        );

        if let Err(e) = self.ensure_device_folder(config).await {
            warn!(device_id = %config.device_id, error = %e, "Could not ensure device folder");
        }

        let items = self
            .list(config, ListScope::Device(config.device_id.clone()))
            .await?;
        let total = items.len();
        let own: Vec<RemoteItem> = items
            .into_iter()
            .filter(|item| item.owner_device_id == config.device_id)
            .collect();
        debug!(total, own = own.len(), "Filtered listing to own device");

        let mut report = SyncReport::default();
        self.transfer_partition(config, &Partition::Own, own, None, &mut report)
            .await
            .map_err(|e| {
                warn!(phase = %SyncPhase::Failed, error = %e, "Own-photo sync failed");
                e
            })?;

        info!(
            phase = %SyncPhase::Done,
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Own-photo sync complete"
        );
        Ok(report)
    }

    /// Downloads every device's photos into per-device partitions
    ///
    /// Each item lands in the partition named after its remote owner,
    /// whichever device runs the pass. `progress` is called after every
    /// successful download.
    pub async fn sync_occasion(
        &self,
        config: &SyncConfig,
        progress: Option<&ProgressFn>,
    ) -> Result<SyncReport, SyncError> {
        info!(
            occasion_id = %config.occasion_id,
            backend = %self.backend.kind(),
            "Starting occasion-wide sync"
        );

        let items = self.list(config, ListScope::Occasion).await?;
        let mut by_owner: BTreeMap<String, Vec<RemoteItem>> = BTreeMap::new();
        for item in items {
            by_owner
                .entry(item.owner_device_id.clone())
                .or_default()
                .push(item);
        }
        debug!(partitions = by_owner.len(), "Grouped listing by owner");

        let mut report = SyncReport::default();
        for (owner, items) in by_owner {
            let safe = is_safe_segment(&owner);
            let message = format!("invalid device name {owner:?}");
            let partition = Partition::Device(owner);
            if !safe {
                warn!(partition = %partition, items = items.len(), "Unusable device name, skipping partition");
                report.failures.extend(items.into_iter().map(|item| ItemFailure {
                    partition: partition.clone(),
                    file_name: item.file_name,
                    kind: None,
                    message: message.clone(),
                }));
                continue;
            }
            self.transfer_partition(config, &partition, items, progress, &mut report)
                .await
                .map_err(|e| {
                    warn!(phase = %SyncPhase::Failed, partition = %partition, error = %e, "Occasion sync failed");
                    e
                })?;
        }

        info!(
            phase = %SyncPhase::Done,
            partitions = report.partitions.len(),
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Occasion-wide sync complete"
        );
        Ok(report)
    }

    /// Uploads one local photo into this device's remote partition
    ///
    /// Either the whole file is accepted by the remote or exactly one error
    /// is returned.
    pub async fn upload(&self, config: &SyncConfig, file: &Path) -> Result<(), SyncError> {
        let local_error = |source| SyncError::LocalFile {
            path: file.to_path_buf(),
            source,
        };
        let metadata = tokio::fs::metadata(file).await.map_err(local_error)?;
        if !metadata.is_file() {
            return Err(local_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        self.ensure_device_folder(config).await?;

        let backend = &self.backend;
        with_reauth(&*self.auth, config, "Upload", |credential| async move {
            backend.upload(config, file, &credential).await
        })
        .await?;

        info!(
            file = %file.display(),
            bytes = metadata.len(),
            device_id = %config.device_id,
            "Photo uploaded"
        );
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn ensure_device_folder(&self, config: &SyncConfig) -> Result<(), RemoteError> {
        if !self.backend.has_containers() {
            return Ok(());
        }
        let backend = &self.backend;
        with_reauth(&*self.auth, config, "Ensure device folder", |credential| async move {
            backend
                .ensure_container(config, Some(config.device_id.as_str()), &credential)
                .await
        })
        .await
    }

    async fn list(&self, config: &SyncConfig, scope: ListScope) -> Result<Vec<RemoteItem>, SyncError> {
        debug!(phase = %SyncPhase::Listing, scope = ?scope, "Listing remote items");
        let backend = &self.backend;
        let scope = &scope;
        let items = with_reauth(&*self.auth, config, "List", |credential| async move {
            backend.list(config, scope, &credential).await
        })
        .await
        .map_err(|e| {
            warn!(phase = %SyncPhase::Failed, error = %e, "Listing failed");
            SyncError::from(e)
        })?;
        info!(count = items.len(), "Remote items listed");
        Ok(items)
    }

    /// Brings `items` into `partition`, recording per-item outcomes
    ///
    /// Only a failure to read the partition's current contents is fatal.
    async fn transfer_partition(
        &self,
        config: &SyncConfig,
        partition: &Partition,
        items: Vec<RemoteItem>,
        progress: Option<&ProgressFn>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let mut known = self
            .store
            .list_known(partition)
            .await
            .map_err(SyncError::Store)?;
        report.partitions.push(partition.clone());

        let missing: Vec<RemoteItem> = items
            .into_iter()
            .filter(|item| {
                let present = known.contains(&item.file_name);
                if present {
                    report.skipped += 1;
                }
                !present
            })
            .collect();
        debug!(
            phase = %SyncPhase::Diffing,
            partition = %partition,
            known = known.len(),
            missing = missing.len(),
            "Diffed against local partition"
        );

        for item in missing {
            // Duplicate names within one listing are fetched once.
            if known.contains(&item.file_name) {
                report.skipped += 1;
                continue;
            }
            match self.fetch(config, partition, &item).await {
                Ok(bytes) => {
                    known.insert(item.file_name.clone());
                    report.downloaded += 1;
                    debug!(
                        phase = %SyncPhase::Transferring,
                        partition = %partition,
                        file_name = %item.file_name,
                        bytes,
                        "Photo downloaded"
                    );
                    if let Some(progress) = progress {
                        progress(DownloadProgress {
                            partition: partition.clone(),
                            file_name: item.file_name.clone(),
                            downloaded: report.downloaded,
                        });
                    }
                }
                Err(SyncError::Remote(RemoteError::NotFound { .. })) => {
                    debug!(partition = %partition, file_name = %item.file_name, "Photo gone from remote, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        phase = %SyncPhase::Transferring,
                        partition = %partition,
                        file_name = %item.file_name,
                        error = %e,
                        "Photo transfer failed, continuing with the next one"
                    );
                    report.failures.push(ItemFailure {
                        partition: partition.clone(),
                        file_name: item.file_name.clone(),
                        kind: e.remote_kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn fetch(
        &self,
        config: &SyncConfig,
        partition: &Partition,
        item: &RemoteItem,
    ) -> Result<u64, SyncError> {
        let backend = &self.backend;
        let body = with_reauth(&*self.auth, config, "Download", |credential| async move {
            backend.download(config, item, &credential).await
        })
        .await?;
        self.store
            .save(partition, &item.file_name, body)
            .await
            .map_err(SyncError::Store)
    }
}

/// Shots left before the own partition reaches `max_photos`
pub async fn remaining_shots(config: &SyncConfig, store: &dyn PhotoStore) -> anyhow::Result<u32> {
    let taken = store.list_known(&Partition::Own).await?.len();
    let taken = u32::try_from(taken).unwrap_or(u32::MAX);
    Ok(config.max_photos.saturating_sub(taken))
}
