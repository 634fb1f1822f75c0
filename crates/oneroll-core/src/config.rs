//! Configuration module for OneRoll.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, invite ingestion and a builder pattern
//! for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::newtypes::is_safe_segment;
use crate::domain::{CredentialMode, RemoteError, SyncConfig};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for OneRoll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub occasion: OccasionConfig,
    pub backend: BackendConfig,
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// The occasion this device contributes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OccasionConfig {
    pub id: String,
    pub name: String,
    /// Capture limit for this device.
    pub max_photos: u32,
}

/// Remote backend selection and credential material.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// REST/JSON broker, bearer token obtained by enrolling with an invite.
    Broker { url: String, invite_token: String },
    /// WebDAV server with static basic auth.
    Webdav {
        url: String,
        #[serde(default)]
        path: String,
        username: String,
        password: String,
    },
}

/// Identity reported to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Stable device id; generated and saved on first run when absent.
    pub id: Option<String>,
    pub model: String,
    pub platform: String,
}

/// Where the token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    Keyring,
    File,
}

/// Local storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// This device's own photos.
    pub photo_dir: PathBuf,
    /// Root of the per-device partitions filled by occasion-wide sync.
    pub occasion_dir: PathBuf,
    /// Token file, used when `token_backend` is `file`.
    pub token_file: PathBuf,
    pub token_backend: TokenBackend,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/oneroll/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("oneroll")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("oneroll")
}

impl Default for OccasionConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            max_photos: 24,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Broker {
            url: String::new(),
            invite_token: String::new(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: None,
            model: "unknown".to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            photo_dir: data_dir.join("photos"),
            occasion_dir: data_dir.join("occasion"),
            token_file: data_dir.join("token.json"),
            token_backend: TokenBackend::Keyring,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::Broker { url, .. } => f
                .debug_struct("Broker")
                .field("url", url)
                .field("invite_token", &"[REDACTED]")
                .finish(),
            BackendConfig::Webdav {
                url,
                path,
                username,
                ..
            } => f
                .debug_struct("Webdav")
                .field("url", url)
                .field("path", path)
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
        }
    }
}

impl BackendConfig {
    /// The configured endpoint URL string.
    pub fn url(&self) -> &str {
        match self {
            BackendConfig::Broker { url, .. } | BackendConfig::Webdav { url, .. } => url,
        }
    }

    /// Short name of the backend kind, as written in the file.
    pub fn kind_name(&self) -> &'static str {
        match self {
            BackendConfig::Broker { .. } => "broker",
            BackendConfig::Webdav { .. } => "webdav",
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"occasion.id"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn check_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{other}'; expected http or https")),
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- occasion ---
        if self.occasion.id.trim().is_empty() {
            push("occasion.id", "must not be empty".into());
        }
        if self.occasion.max_photos == 0 {
            push("occasion.max_photos", "must be greater than 0".into());
        }

        // --- backend ---
        if let Err(message) = check_url(self.backend.url()) {
            push("backend.url", message);
        }
        match &self.backend {
            BackendConfig::Broker { invite_token, .. } => {
                if invite_token.trim().is_empty() {
                    push("backend.invite_token", "must not be empty".into());
                }
            }
            BackendConfig::Webdav { username, .. } => {
                if username.trim().is_empty() {
                    push("backend.username", "must not be empty".into());
                }
            }
        }

        // --- device ---
        if let Some(id) = &self.device.id {
            if !is_safe_segment(id) {
                push(
                    "device.id",
                    format!("'{id}' cannot be used as a folder name"),
                );
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }

    /// Build the immutable per-pass [`SyncConfig`].
    ///
    /// # Errors
    /// [`RemoteError::Configuration`] for an unusable endpoint URL, a missing
    /// device id, or blank identity fields.
    pub fn sync_config(&self) -> Result<SyncConfig, RemoteError> {
        let endpoint_base = check_url(self.backend.url()).map_err(RemoteError::Configuration)?;

        let occasion_id = self.occasion.id.trim();
        if occasion_id.is_empty() {
            return Err(RemoteError::Configuration(
                "occasion id is not set".to_string(),
            ));
        }

        let device_id = self
            .device
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| is_safe_segment(id))
            .ok_or_else(|| {
                RemoteError::Configuration("device id is missing or invalid".to_string())
            })?;

        let (path_prefix, credential_mode) = match &self.backend {
            BackendConfig::Broker { invite_token, .. } => {
                if invite_token.trim().is_empty() {
                    return Err(RemoteError::Configuration(
                        "invite token is not set".to_string(),
                    ));
                }
                (
                    String::new(),
                    CredentialMode::BearerViaEnroll {
                        invite_token: invite_token.trim().to_string(),
                    },
                )
            }
            BackendConfig::Webdav {
                path,
                username,
                password,
                ..
            } => {
                if username.trim().is_empty() {
                    return Err(RemoteError::Configuration(
                        "WebDAV username is not set".to_string(),
                    ));
                }
                (
                    path.clone(),
                    CredentialMode::Basic {
                        username: username.clone(),
                        password: password.clone(),
                    },
                )
            }
        };

        Ok(SyncConfig {
            endpoint_base,
            path_prefix,
            credential_mode,
            occasion_id: occasion_id.to_string(),
            device_id: device_id.to_string(),
            device_model: self.device.model.clone(),
            platform: self.device.platform.clone(),
            max_photos: self.occasion.max_photos,
        })
    }
}

// ---------------------------------------------------------------------------
// Invite ingestion
// ---------------------------------------------------------------------------

/// Occasion invite as distributed to guests (usually via QR code).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub occasion_id: String,
    pub occasion_name: String,
    pub max_photos: u32,
    #[serde(rename = "brokerURL")]
    pub broker_url: String,
    pub invite_token: String,
}

impl Config {
    /// Apply an invite JSON document to the `occasion` and `backend` sections.
    ///
    /// Every field of the invite is required. The bearer token obtained with
    /// a previous invite is no longer valid afterwards; callers clear their
    /// token store.
    pub fn apply_invite(&mut self, raw_json: &str) -> anyhow::Result<Invite> {
        let invite: Invite = serde_json::from_str(raw_json)?;
        if let Err(message) = check_url(&invite.broker_url) {
            anyhow::bail!("brokerURL: {message}");
        }
        self.occasion.id = invite.occasion_id.clone();
        self.occasion.name = invite.occasion_name.clone();
        self.occasion.max_photos = invite.max_photos;
        self.backend = BackendConfig::Broker {
            url: invite.broker_url.clone(),
            invite_token: invite.invite_token.clone(),
        };
        Ok(invite)
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use oneroll_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .occasion_id("wedding-2025")
///     .broker("https://broker.example.com", "invite-123")
///     .device_id("pixel-abc")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- occasion ---

    pub fn occasion_id(mut self, id: impl Into<String>) -> Self {
        self.config.occasion.id = id.into();
        self
    }

    pub fn occasion_name(mut self, name: impl Into<String>) -> Self {
        self.config.occasion.name = name.into();
        self
    }

    pub fn max_photos(mut self, n: u32) -> Self {
        self.config.occasion.max_photos = n;
        self
    }

    // --- backend ---

    pub fn broker(mut self, url: impl Into<String>, invite_token: impl Into<String>) -> Self {
        self.config.backend = BackendConfig::Broker {
            url: url.into(),
            invite_token: invite_token.into(),
        };
        self
    }

    pub fn webdav(
        mut self,
        url: impl Into<String>,
        path: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.backend = BackendConfig::Webdav {
            url: url.into(),
            path: path.into(),
            username: username.into(),
            password: password.into(),
        };
        self
    }

    // --- device ---

    pub fn device_id(mut self, id: impl Into<String>) -> Self {
        self.config.device.id = Some(id.into());
        self
    }

    pub fn device_model(mut self, model: impl Into<String>) -> Self {
        self.config.device.model = model.into();
        self
    }

    pub fn device_platform(mut self, platform: impl Into<String>) -> Self {
        self.config.device.platform = platform.into();
        self
    }

    // --- storage ---

    pub fn photo_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.photo_dir = dir;
        self
    }

    pub fn occasion_dir(mut self, dir: PathBuf) -> Self {
        self.config.storage.occasion_dir = dir;
        self
    }

    pub fn token_file(mut self, file: PathBuf) -> Self {
        self.config.storage.token_file = file;
        self
    }

    pub fn token_backend(mut self, backend: TokenBackend) -> Self {
        self.config.storage.token_backend = backend;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or all
    /// validation errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
