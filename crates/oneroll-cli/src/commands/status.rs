//! Status command - Display occasion and local photo status
//!
//! Provides the `oneroll status` CLI command which:
//! 1. Shows the occasion, backend and device identity from config
//! 2. Counts photos per local partition (own and each pulled device)
//! 3. Shows the remaining shots for this device

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use oneroll_core::domain::Partition;
use oneroll_core::ports::PhotoStore;
use oneroll_sync::{remaining_shots, LocalPhotoStore};
use tracing::info;

use crate::app::App;
use crate::output::{count, get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// Photo count and size of one local partition
#[derive(Debug, Clone, PartialEq)]
struct PartitionSummary {
    partition: Partition,
    photos: usize,
    bytes: u64,
    newest: Option<DateTime<Utc>>,
}

impl PartitionSummary {
    async fn collect(store: &LocalPhotoStore, partition: Partition) -> Result<Self> {
        let photos = store
            .list_photos(&partition)
            .await
            .with_context(|| format!("Failed to list {} photos", partition))?;
        Ok(Self {
            photos: photos.len(),
            bytes: photos.iter().map(|p| p.size).sum(),
            newest: photos.first().map(|p| p.modified),
            partition,
        })
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "partition": self.partition.to_string(),
            "photos": self.photos,
            "bytes": self.bytes,
            "newest": self.newest.map(|t| t.to_rfc3339()),
        })
    }

    fn describe(&self) -> String {
        format!("{}, {}", count(self.photos, "photo"), format_bytes(self.bytes))
    }
}

impl StatusCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = App::load(config_path)?;
        let config = &app.config;
        let store = app.photo_store();

        info!(config_path = %config_path.display(), "Showing status");

        let own = PartitionSummary::collect(&store, Partition::Own).await?;
        let mut devices = Vec::new();
        for partition in store.device_partitions().await? {
            devices.push(PartitionSummary::collect(&store, partition).await?);
        }

        // Without a complete config there is no per-pass limit to count against.
        let remaining = match config.sync_config() {
            Ok(sync_config) => Some(remaining_shots(&sync_config, &store).await?),
            Err(_) => None,
        };
        let problems = config.validate();

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "occasion": {
                    "id": config.occasion.id,
                    "name": config.occasion.name,
                    "max_photos": config.occasion.max_photos,
                },
                "backend": {
                    "kind": config.backend.kind_name(),
                    "url": config.backend.url(),
                },
                "device_id": config.device.id,
                "own": own.to_json(),
                "devices": devices.iter().map(PartitionSummary::to_json).collect::<Vec<_>>(),
                "remaining_shots": remaining,
                "config_errors": problems.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            }));
            return Ok(());
        }

        if config.occasion.id.is_empty() {
            formatter.warn("No occasion joined. Run 'oneroll config invite <file>'");
        } else {
            formatter.success(&format!("Occasion '{}'", display_name(config)));
        }
        formatter.field("Backend", &format!("{} ({})", config.backend.kind_name(), config.backend.url()));
        formatter.field("Device", config.device.id.as_deref().unwrap_or("not assigned yet"));
        formatter.field(
            "Remaining shots",
            &match remaining {
                Some(n) => format!("{} of {}", n, config.occasion.max_photos),
                None => "unknown".to_string(),
            },
        );
        formatter.info("");
        display_partitions(&own, &devices, &*formatter);

        if !problems.is_empty() {
            formatter.info("");
            formatter.warn(&format!(
                "Configuration has {}; run 'oneroll config validate'",
                count(problems.len(), "problem")
            ));
        }
        Ok(())
    }
}

fn display_name(config: &oneroll_core::config::Config) -> &str {
    if config.occasion.name.trim().is_empty() {
        &config.occasion.id
    } else {
        &config.occasion.name
    }
}

fn display_partitions(
    own: &PartitionSummary,
    devices: &[PartitionSummary],
    formatter: &dyn OutputFormatter,
) {
    formatter.field("Own photos", &own.describe());
    if devices.is_empty() {
        formatter.field("Occasion", "not synced");
        return;
    }
    let total: usize = devices.iter().map(|d| d.photos).sum();
    formatter.field(
        "Occasion",
        &format!("{} from {}", count(total, "photo"), count(devices.len(), "device")),
    );
    for device in devices {
        if let Partition::Device(id) = &device.partition {
            formatter.info(&format!("  {:<20} {}", id, device.describe()));
        }
    }
}

/// Format bytes as a human-readable string (e.g., "2.1 MB").
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
