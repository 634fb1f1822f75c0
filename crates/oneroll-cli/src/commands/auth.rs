//! Auth commands - Enroll, Logout, and Status for the broker token
//!
//! Provides the `oneroll auth` CLI subcommands which:
//! 1. `enroll` - Enrolls with the broker using the invite token and stores
//!    the bearer token in the configured token store.
//! 2. `logout` - Clears the stored token.
//! 3. `status` - Shows token validity and expiry.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use oneroll_core::domain::{AuthToken, BackendKind};
use oneroll_core::ports::Authenticator;
use oneroll_remote::HttpClient;
use tracing::info;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Enroll with the broker, replacing any stored token
    Enroll,
    /// Remove the stored token
    Logout,
    /// Check token status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        let mut app = App::load(config_path)?;
        match self {
            AuthCommand::Enroll => execute_enroll(&mut app, &*fmt, format).await,
            AuthCommand::Logout => execute_logout(&app, &*fmt),
            AuthCommand::Status => execute_status(&app, &*fmt, format),
        }
    }
}

async fn execute_enroll(app: &mut App, fmt: &dyn OutputFormatter, format: OutputFormat) -> Result<()> {
    let sync_config = app.sync_config()?;
    if sync_config.backend_kind() == BackendKind::WebDav {
        fmt.info("WebDAV backends use basic auth; nothing to enroll");
        return Ok(());
    }

    info!(occasion_id = %sync_config.occasion_id, "Enrolling with broker");
    let auth = app.auth_manager(HttpClient::new());
    let token = auth
        .refresh(&sync_config)
        .await
        .context("Enrollment failed")?;

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "occasion_id": sync_config.occasion_id,
            "device_id": sync_config.device_id,
            "expires_at": token.expires_at.map(|t| t.to_rfc3339()),
        }));
    } else {
        fmt.success(&format!("Enrolled in '{}'", sync_config.occasion_id));
        fmt.field("Device", &sync_config.device_id);
        fmt.field("Expires", &describe_expiry(token.expires_at));
    }
    Ok(())
}

fn execute_logout(app: &App, fmt: &dyn OutputFormatter) -> Result<()> {
    info!(occasion_id = %app.config.occasion.id, "Logging out");
    app.token_store()
        .clear()
        .context("Failed to clear stored token")?;
    fmt.success("Logged out successfully");
    Ok(())
}

fn execute_status(app: &App, fmt: &dyn OutputFormatter, format: OutputFormat) -> Result<()> {
    if app.config.backend.kind_name() != "broker" {
        fmt.info("Authentication status: basic auth (WebDAV)");
        return Ok(());
    }

    let loaded = app.token_store().load();
    let (status, expires_at) = match &loaded {
        Ok(token) => (
            token_status(token.as_ref(), Utc::now()),
            token.as_ref().and_then(|t| t.expires_at),
        ),
        Err(_) => ("error reading token store", None),
    };

    if format.is_json() {
        fmt.print_json(&serde_json::json!({
            "occasion_id": app.config.occasion.id,
            "token_status": status,
            "expires_at": expires_at.map(|t| t.to_rfc3339()),
        }));
    } else {
        match loaded {
            Ok(Some(_)) => fmt.success(&format!("Token {}", status)),
            Ok(None) => {
                fmt.info("Authentication status: not enrolled");
                fmt.info("Run 'oneroll auth enroll' to enroll");
            }
            Err(e) => fmt.error(&format!("Failed to read token store: {:#}", e)),
        }
        fmt.field("Occasion", &app.config.occasion.id);
        if expires_at.is_some() {
            fmt.field("Expires", &describe_expiry(expires_at));
        }
    }
    Ok(())
}

fn token_status(token: Option<&AuthToken>, now: DateTime<Utc>) -> &'static str {
    match token {
        Some(token) if token.is_valid_at(now) => "valid",
        Some(_) => "expired",
        None => "not found",
    }
}

fn describe_expiry(expires_at: Option<DateTime<Utc>>) -> String {
    match expires_at {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}
