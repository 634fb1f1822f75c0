//! Broker enrollment and bearer token lifecycle
//!
//! ## Components
//!
//! - [`AuthManager`] - caches, refreshes and persists the bearer token
//! - [`parse_expiry`] - tolerant expiry parsing of enrollment responses
//! - [`KeyringTokenStore`] - token persistence in the system keyring
//! - [`FileTokenStore`] - token persistence in a JSON file
//! - [`MemoryTokenStore`] - in-process storage, for tests and one-shot runs
//!
//! A single [`AuthManager`] is shared by the upload and download paths. Its
//! cache lock is held across the enrollment call, so concurrent refreshes
//! queue behind the first one and then pick up its token.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use oneroll_core::domain::{AuthToken, CredentialMode, RemoteError, SyncConfig};
use oneroll_core::ports::{Authenticator, TokenStore};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{endpoint, HttpClient};

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "oneroll";

/// Token field aliases, in priority order
const TOKEN_FIELDS: &[&str] = &["uploadToken", "token"];

/// Numeric absolute expiry fields, in priority order
const ABSOLUTE_EXPIRY_FIELDS: &[&str] = &["uploadTokenExpiresAt", "expiresAt", "expires"];

/// Numeric expiry relative to the enrollment instant
const RELATIVE_EXPIRY_FIELD: &str = "uploadTokenExpiresInSeconds";

/// String expiry fields, in priority order
const STRING_EXPIRY_FIELDS: &[&str] = &["uploadTokenExpiresAt", "expiresAt"];

/// Epoch values at or above this are milliseconds, below are seconds
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

// ============================================================================
// Enrollment wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest<'a> {
    invite_token: &'a str,
    occasion_id: &'a str,
    device_id: &'a str,
    platform: &'a str,
    device_model: &'a str,
}

// ============================================================================
// Expiry parsing
// ============================================================================

fn from_epoch(raw: i64) -> Option<DateTime<Utc>> {
    if raw >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else if raw > 0 {
        DateTime::from_timestamp(raw, 0)
    } else {
        None
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    raw.parse::<i64>().ok().and_then(from_epoch)
}

/// Extracts the token expiry from an enrollment response
///
/// The first numeric expiry field present decides: absolute fields are epoch
/// milliseconds or seconds by magnitude, the relative field counts seconds
/// from `now`. Otherwise string fields are tried as timestamps. Anything
/// unparseable, zero or negative means the token never expires.
pub fn parse_expiry(json: &Value, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for field in ABSOLUTE_EXPIRY_FIELDS {
        if let Some(raw) = json.get(*field).filter(|v| v.is_number()).and_then(as_i64) {
            return from_epoch(raw);
        }
    }
    if let Some(raw) = json
        .get(RELATIVE_EXPIRY_FIELD)
        .filter(|v| v.is_number())
        .and_then(as_i64)
    {
        if raw <= 0 {
            return None;
        }
        return chrono::Duration::try_seconds(raw).and_then(|d| now.checked_add_signed(d));
    }
    STRING_EXPIRY_FIELDS
        .iter()
        .filter_map(|field| json.get(*field).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .find_map(parse_timestamp)
}

/// Builds the token from an enrollment response body
pub fn parse_enrollment(body: &str, now: DateTime<Utc>) -> Result<AuthToken, RemoteError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| RemoteError::Configuration(format!("Enroll response is not JSON: {e}")))?;
    let token = TOKEN_FIELDS
        .iter()
        .filter_map(|field| json.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|token| !token.is_empty())
        .ok_or_else(|| {
            RemoteError::Configuration("Enroll response missing upload token".to_string())
        })?;
    Ok(AuthToken::new(token, parse_expiry(&json, now)))
}

// ============================================================================
// AuthManager
// ============================================================================

/// Caches and refreshes the broker bearer token
pub struct AuthManager {
    http: HttpClient,
    store: Arc<dyn TokenStore>,
    cache: Mutex<Option<AuthToken>>,
}

impl AuthManager {
    /// Creates a manager, resuming with the persisted token if any
    pub fn new(http: HttpClient, store: Arc<dyn TokenStore>) -> Self {
        let persisted = match store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted token, starting without one");
                None
            }
        };
        if persisted.is_some() {
            debug!("Resuming with persisted token");
        }
        Self {
            http,
            store,
            cache: Mutex::new(persisted),
        }
    }

    /// Returns the cached token, valid or not
    pub async fn cached(&self) -> Option<AuthToken> {
        self.cache.lock().await.clone()
    }

    /// Drops the cached token and clears the store
    pub async fn clear(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        *cache = None;
        self.store.clear()
    }

    /// Enrolls with the broker and returns the fresh token
    async fn enroll(&self, config: &SyncConfig) -> Result<AuthToken, RemoteError> {
        let invite_token = match &config.credential_mode {
            CredentialMode::BearerViaEnroll { invite_token } => invite_token,
            CredentialMode::Basic { .. } => {
                return Err(RemoteError::Configuration(
                    "basic-auth backends do not enroll".to_string(),
                ))
            }
        };

        let request = EnrollRequest {
            invite_token,
            occasion_id: &config.occasion_id,
            device_id: &config.device_id,
            platform: &config.platform,
            device_model: &config.device_model,
        };

        let url = endpoint(&config.endpoint_base, ["enroll"])?;
        debug!(occasion_id = %config.occasion_id, device_id = %config.device_id, "Enrolling");
        let response = self
            .http
            .send("Enroll", self.http.request(Method::POST, url, None).json(&request))
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::connection("Enroll", e))?;

        let token = parse_enrollment(&body, Utc::now())?;
        info!(expires_at = ?token.expires_at, "Enrollment succeeded");
        Ok(token)
    }

    /// Enrolls, persists and caches; caller holds the cache lock
    async fn refresh_locked(
        &self,
        cache: &mut Option<AuthToken>,
        config: &SyncConfig,
    ) -> Result<AuthToken, RemoteError> {
        let token = self.enroll(config).await?;
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to persist refreshed token");
        }
        *cache = Some(token.clone());
        Ok(token)
    }
}

#[async_trait]
impl Authenticator for AuthManager {
    async fn ensure_valid(&self, config: &SyncConfig) -> Result<AuthToken, RemoteError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.clone());
        }
        debug!("No valid cached token, refreshing");
        self.refresh_locked(&mut cache, config).await
    }

    async fn refresh(&self, config: &SyncConfig) -> Result<AuthToken, RemoteError> {
        let mut cache = self.cache.lock().await;
        self.refresh_locked(&mut cache, config).await
    }

    async fn refresh_if_current(
        &self,
        config: &SyncConfig,
        stale: Option<&AuthToken>,
    ) -> Result<AuthToken, RemoteError> {
        let mut cache = self.cache.lock().await;
        if let Some(current) = cache.as_ref() {
            if Some(current) != stale && current.is_valid() {
                debug!("Token already refreshed by another caller");
                return Ok(current.clone());
            }
        }
        self.refresh_locked(&mut cache, config).await
    }
}

// ============================================================================
// Token stores
// ============================================================================

/// Stores the token in the system keyring
///
/// Uses the `keyring` crate (GNOME Keyring, KDE Wallet, macOS Keychain).
/// The token is serialized as JSON under service "oneroll", keyed by the
/// occasion id.
pub struct KeyringTokenStore {
    account: String,
}

impl KeyringTokenStore {
    pub fn new(occasion_id: impl Into<String>) -> Self {
        Self {
            account: occasion_id.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.account).context("Failed to create keyring entry")
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<AuthToken>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let token: AuthToken = serde_json::from_str(&json)
                    .context("Failed to deserialize token from keyring")?;
                debug!(account = %self.account, "Loaded token from keyring");
                Ok(Some(token))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn save(&self, token: &AuthToken) -> Result<()> {
        let json = serde_json::to_string(token).context("Failed to serialize token")?;
        self.entry()?
            .set_password(&json)
            .context("Failed to store token in keyring")?;
        debug!(account = %self.account, "Stored token in keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) => {
                info!(account = %self.account, "Cleared token from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

/// Stores the token as JSON in a file, replaced atomically
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<AuthToken>> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => {
                let token = serde_json::from_str(&json)
                    .with_context(|| format!("Invalid token file {}", self.path.display()))?;
                Ok(Some(token))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", self.path.display()))),
        }
    }

    fn save(&self, token: &AuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_vec(token).context("Failed to serialize token")?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to remove {}", self.path.display()))),
        }
    }
}

/// Keeps the token in memory only
#[derive(Default)]
pub struct MemoryTokenStore {
    token: std::sync::Mutex<Option<AuthToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AuthToken) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(token)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<AuthToken>>> {
        self.token
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<AuthToken>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, token: &AuthToken) -> Result<()> {
        *self.slot()? = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
