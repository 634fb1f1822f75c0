//! Token persistence port

use crate::domain::AuthToken;

/// Persists the bearer token so a restarted process can resume with it
///
/// Synchronous: implementations touch the keyring or a small file.
pub trait TokenStore: Send + Sync {
    /// Loads the stored token, `None` if nothing is stored
    fn load(&self) -> anyhow::Result<Option<AuthToken>>;

    /// Replaces the stored token
    fn save(&self, token: &AuthToken) -> anyhow::Result<()>;

    /// Removes the stored token; succeeds if nothing was stored
    fn clear(&self) -> anyhow::Result<()>;
}
