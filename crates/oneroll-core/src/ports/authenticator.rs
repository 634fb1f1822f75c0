//! Authenticator port (driven/secondary port)

use async_trait::async_trait;

use crate::domain::{AuthToken, RemoteError, SyncConfig};

/// Bearer token lifecycle for the broker backend
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the cached token if it is still valid, otherwise refreshes
    async fn ensure_valid(&self, config: &SyncConfig) -> Result<AuthToken, RemoteError>;

    /// Enrolls unconditionally and replaces the cached token
    async fn refresh(&self, config: &SyncConfig) -> Result<AuthToken, RemoteError>;

    /// Refreshes only if `stale` is still the cached token
    ///
    /// When another caller already replaced the token that was rejected, the
    /// newer token is returned without enrolling again, so concurrent callers
    /// that hit the same 401 coalesce into one enrollment.
    async fn refresh_if_current(
        &self,
        config: &SyncConfig,
        stale: Option<&AuthToken>,
    ) -> Result<AuthToken, RemoteError>;
}
