//! Upload command - Send photos to the occasion
//!
//! Every file goes through one upload coordinator, so uploads run strictly
//! in the order given. Completion callbacks come back through a
//! [`callback_channel`] and are reported as they arrive.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use oneroll_sync::{callback_channel, SyncCoordinator, SyncError};
use tracing::info;

use crate::app::App;
use crate::output::{count, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// JPEG files to upload, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Result of one queued upload
#[derive(Debug)]
struct UploadOutcome {
    file: PathBuf,
    error: Option<String>,
}

impl UploadCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut app = App::load(config_path)?;
        let session = app.session()?;

        info!(files = self.files.len(), backend = %session.sync_config.backend_kind(), "Uploading");

        let (dispatcher, mut queue) = callback_channel();
        let coordinator = SyncCoordinator::new("uploads", session.engine, Arc::new(dispatcher));
        let (tx, rx) = mpsc::channel();

        for file in &self.files {
            let tx = tx.clone();
            let reported = file.clone();
            coordinator.upload_photo(
                session.sync_config.clone(),
                file.clone(),
                move |result: Result<(), SyncError>| {
                    let _ = tx.send(UploadOutcome {
                        file: reported,
                        error: result.err().map(|e| e.to_string()),
                    });
                },
            );
        }

        let mut outcomes = Vec::with_capacity(self.files.len());
        while outcomes.len() < self.files.len() && queue.run_next().await {
            for outcome in rx.try_iter() {
                if !format.is_json() {
                    match &outcome.error {
                        None => formatter.success(&format!("Uploaded {}", outcome.file.display())),
                        Some(e) => formatter.error(&format!("{}: {}", outcome.file.display(), e)),
                    }
                }
                outcomes.push(outcome);
            }
        }
        coordinator.drain().await;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if format.is_json() {
            formatter.print_json(&outcomes_json(&outcomes));
        } else {
            formatter.info(&format!(
                "{} uploaded, {} failed",
                count(outcomes.len() - failed, "photo"),
                failed
            ));
        }

        if failed > 0 {
            anyhow::bail!("{} of {} uploads failed", failed, self.files.len());
        }
        Ok(())
    }
}

fn outcomes_json(outcomes: &[UploadOutcome]) -> serde_json::Value {
    let items: Vec<_> = outcomes
        .iter()
        .map(|o| {
            serde_json::json!({
                "file": o.file.display().to_string(),
                "success": o.error.is_none(),
                "error": o.error,
            })
        })
        .collect();
    serde_json::json!({
        "uploaded": outcomes.iter().filter(|o| o.error.is_none()).count(),
        "failed": outcomes.iter().filter(|o| o.error.is_some()).count(),
        "files": items,
    })
}
