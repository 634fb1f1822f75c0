//! Sync command - Download missing photos
//!
//! Provides the `oneroll sync` CLI command which:
//! 1. Wires the backend, token store and local photo store from config
//! 2. Queues one pass on a download coordinator (own photos, or the whole
//!    occasion with `--occasion`)
//! 3. Prints progress lines as photos land and a summary of the report

use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use oneroll_sync::{callback_channel, DownloadProgress, SyncCoordinator, SyncReport};
use tracing::info;

use crate::app::App;
use crate::output::{count, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Pull every device's photos instead of only this device's
    #[arg(long)]
    pub occasion: bool,
}

impl SyncCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut app = App::load(config_path)?;
        let session = app.session()?;

        info!(
            occasion = self.occasion,
            backend = %session.sync_config.backend_kind(),
            "Starting sync"
        );

        let (dispatcher, mut queue) = callback_channel();
        let coordinator = SyncCoordinator::new("downloads", session.engine, Arc::new(dispatcher));
        let (tx, rx) = mpsc::channel();

        if self.occasion {
            coordinator.sync_occasion_photos(
                session.sync_config.clone(),
                move |progress: DownloadProgress| {
                    if !format.is_json() {
                        get_formatter(format).info(&progress_line(&progress));
                    }
                },
                move |result| {
                    let _ = tx.send(result);
                },
            );
        } else {
            coordinator.sync_own_photos(session.sync_config.clone(), move |result| {
                let _ = tx.send(result);
            });
        }

        let result = loop {
            if let Ok(result) = rx.try_recv() {
                break result;
            }
            if !queue.run_next().await {
                anyhow::bail!("Sync stopped before reporting a result");
            }
        };
        coordinator.drain().await;

        let report = result?;
        if format.is_json() {
            formatter.print_json(&report_json(&report));
        } else {
            display_report(&report, &*formatter);
        }
        Ok(())
    }
}

fn progress_line(progress: &DownloadProgress) -> String {
    format!(
        "\u{2193} {} [{}] ({} so far)",
        progress.file_name, progress.partition, progress.downloaded
    )
}

fn display_report(report: &SyncReport, formatter: &dyn crate::output::OutputFormatter) {
    if report.is_clean() {
        formatter.success("Sync completed");
    } else {
        formatter.warn(&format!(
            "Sync completed with {}",
            count(report.failures.len(), "failure")
        ));
    }
    formatter.field("Downloaded", &report.downloaded.to_string());
    formatter.field("Already local", &report.skipped.to_string());
    if !report.partitions.is_empty() {
        let partitions: Vec<String> = report.partitions.iter().map(|p| p.to_string()).collect();
        formatter.field("Partitions", &partitions.join(", "));
    }
    for failure in &report.failures {
        formatter.error(&format!(
            "{} [{}]: {}",
            failure.file_name, failure.partition, failure.message
        ));
    }
}

fn report_json(report: &SyncReport) -> serde_json::Value {
    let failures: Vec<_> = report
        .failures
        .iter()
        .map(|f| {
            serde_json::json!({
                "partition": f.partition.to_string(),
                "file_name": f.file_name,
                "kind": f.kind.map(|k| format!("{:?}", k)),
                "message": f.message,
            })
        })
        .collect();
    serde_json::json!({
        "success": report.is_clean(),
        "downloaded": report.downloaded,
        "skipped": report.skipped,
        "partitions": report.partitions.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        "failures": failures,
    })
}
