//! Config command - View and manage OneRoll configuration
//!
//! Provides the `oneroll config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON) with secrets masked
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Joins an occasion from an invite document

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use oneroll_core::config::{Config, TokenBackend};
use serde_json::Value;
use tracing::{info, warn};

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

const MASK: &str = "********";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "occasion.max_photos")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Join an occasion from an invite JSON file ("-" reads stdin)
    Invite {
        file: PathBuf,
    },
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
            ConfigCommand::Invite { file } => execute_invite(config_path, file, format).await,
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let app = App::load(config_path)?;

    info!(config_path = %config_path.display(), "Showing configuration");

    let value = masked(&app.config)?;
    if format.is_json() {
        formatter.print_json(&value);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&value).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_set(config_path: &Path, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut app = App::load(config_path)?;

    info!(key = %key, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut app.config, key, value) {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<24} - {}", name, help));
            }
        }
        return Ok(());
    }

    // Only reject problems with the key being set
    let errors: Vec<String> = app
        .config
        .validate()
        .iter()
        .filter(|e| e.field == key)
        .map(|e| e.to_string())
        .collect();
    if !errors.is_empty() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "errors": errors,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
        }
        return Ok(());
    }

    app.save()?;
    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {}", key));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": config_path.display().to_string(),
                "errors": ["Configuration file not found"],
            }));
        } else {
            formatter.info(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Run 'oneroll config invite <file>' to join an occasion.");
        }
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {}", e)],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {}", e));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

async fn execute_invite(config_path: &Path, file: &Path, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let raw = if file == Path::new("-") {
        let mut raw = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut raw)
            .context("Failed to read invite from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read invite {}", file.display()))?
    };

    let mut app = App::load(config_path)?;
    // The token belongs to the previous occasion; clear it under that key.
    let previous_store = app.token_store();

    let invite = app.config.apply_invite(&raw).context("Invalid invite")?;
    app.ensure_device_id()?;
    app.save()?;

    if let Err(e) = previous_store.clear() {
        warn!(error = %e, "Failed to clear previous token");
    }
    if let Err(e) = app.token_store().clear() {
        warn!(error = %e, "Failed to clear stored token");
    }

    info!(occasion_id = %invite.occasion_id, "Joined occasion");

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "occasion_id": invite.occasion_id,
            "occasion_name": invite.occasion_name,
            "max_photos": invite.max_photos,
            "broker_url": invite.broker_url,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Joined '{}'", invite.occasion_name));
        formatter.field("Occasion", &invite.occasion_id);
        formatter.field("Broker", &invite.broker_url);
        formatter.field("Shots", &invite.max_photos.to_string());
        formatter.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

/// Serializes `config` with credentials replaced by a mask
fn masked(config: &Config) -> Result<Value> {
    let mut value =
        serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
    if let Some(backend) = value.get_mut("backend").and_then(Value::as_object_mut) {
        for secret in ["invite_token", "password"] {
            if let Some(field) = backend.get_mut(secret) {
                if field.as_str().is_some_and(|s| !s.is_empty()) {
                    *field = Value::String(MASK.to_string());
                }
            }
        }
    }
    Ok(value)
}

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("occasion.name", "Display name"),
    ("occasion.max_photos", "Capture limit for this device"),
    ("backend.url", "Broker or WebDAV server URL"),
    ("backend.path", "WebDAV folder path"),
    ("backend.username", "WebDAV user"),
    ("backend.password", "WebDAV password"),
    ("device.model", "Reported device model"),
    ("device.platform", "Reported platform"),
    ("storage.photo_dir", "Own photos directory"),
    ("storage.occasion_dir", "Occasion-wide photos directory"),
    ("storage.token_file", "Token file path"),
    ("storage.token_backend", "keyring|file"),
    ("logging.level", "trace|debug|info|warn|error"),
];

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    use oneroll_core::config::BackendConfig;

    match (key, &mut config.backend) {
        // --- occasion ---
        ("occasion.name", _) => config.occasion.name = value.to_string(),
        ("occasion.max_photos", _) => {
            config.occasion.max_photos = value
                .parse::<u32>()
                .context("Expected a positive integer for occasion.max_photos")?;
        }

        // --- backend ---
        ("backend.url", BackendConfig::Broker { url, .. })
        | ("backend.url", BackendConfig::Webdav { url, .. }) => *url = value.to_string(),
        ("backend.path", BackendConfig::Webdav { path, .. }) => *path = value.to_string(),
        ("backend.username", BackendConfig::Webdav { username, .. }) => {
            *username = value.to_string()
        }
        ("backend.password", BackendConfig::Webdav { password, .. }) => {
            *password = value.to_string()
        }
        ("backend.path" | "backend.username" | "backend.password", BackendConfig::Broker { .. }) => {
            anyhow::bail!("'{}' only applies to a WebDAV backend", key);
        }

        // --- device ---
        ("device.model", _) => config.device.model = value.to_string(),
        ("device.platform", _) => config.device.platform = value.to_string(),

        // --- storage ---
        ("storage.photo_dir", _) => config.storage.photo_dir = PathBuf::from(value),
        ("storage.occasion_dir", _) => config.storage.occasion_dir = PathBuf::from(value),
        ("storage.token_file", _) => config.storage.token_file = PathBuf::from(value),
        ("storage.token_backend", _) => {
            config.storage.token_backend = match value {
                "keyring" => TokenBackend::Keyring,
                "file" => TokenBackend::File,
                other => anyhow::bail!("Expected keyring or file, got '{}'", other),
            };
        }

        // --- logging ---
        ("logging.level", _) => config.logging.level = value.to_string(),

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }
    Ok(())
}
