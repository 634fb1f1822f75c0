//! Immutable per-pass sync configuration

use url::Url;

/// How remote calls authenticate
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialMode {
    /// Static basic auth (WebDAV)
    Basic { username: String, password: String },
    /// Bearer token obtained by enrolling with an invite (broker)
    BearerViaEnroll { invite_token: String },
}

impl std::fmt::Debug for CredentialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialMode::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            CredentialMode::BearerViaEnroll { .. } => f
                .debug_struct("BearerViaEnroll")
                .field("invite_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Backend protocol, derived from the credential mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Broker,
    WebDav,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Broker => write!(f, "broker"),
            BackendKind::WebDav => write!(f, "webdav"),
        }
    }
}

/// Everything a sync pass needs to know about endpoint and identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Broker base URL, or WebDAV server root (its path is kept)
    pub endpoint_base: Url,
    /// WebDAV folder path below the base; empty for the broker
    pub path_prefix: String,
    pub credential_mode: CredentialMode,
    pub occasion_id: String,
    pub device_id: String,
    pub device_model: String,
    pub platform: String,
    pub max_photos: u32,
}

impl SyncConfig {
    /// Returns the backend this configuration targets
    pub fn backend_kind(&self) -> BackendKind {
        match self.credential_mode {
            CredentialMode::Basic { .. } => BackendKind::WebDav,
            CredentialMode::BearerViaEnroll { .. } => BackendKind::Broker,
        }
    }

    /// Splits the path prefix into non-empty segments
    pub fn prefix_segments(&self) -> Vec<&str> {
        self.path_prefix
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}
