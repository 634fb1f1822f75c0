//! Refresh-once, retry-once policy for remote calls
//!
//! Every remote call made by the engine (listing, container creation, each
//! upload and each download) goes through [`with_reauth`]. There is no
//! backoff and no retry on non-auth failures.

use std::future::Future;

use oneroll_core::domain::{Credential, CredentialMode, RemoteError, SyncConfig};
use oneroll_core::ports::Authenticator;
use tracing::{debug, info, warn};

use crate::engine::SyncPhase;

/// Resolves the credential for `config`
///
/// Basic credentials come straight from the configuration; bearer tokens
/// come from the authenticator's cache or a fresh enrollment.
pub async fn credential_for(
    auth: &dyn Authenticator,
    config: &SyncConfig,
) -> Result<Credential, RemoteError> {
    match &config.credential_mode {
        CredentialMode::Basic { username, password } => Ok(Credential::Basic {
            username: username.clone(),
            password: password.clone(),
        }),
        CredentialMode::BearerViaEnroll { .. } => {
            auth.ensure_valid(config).await.map(Credential::Bearer)
        }
    }
}

/// Runs `op`, refreshing the bearer token and retrying exactly once on
/// `Unauthorized`
///
/// A second `Unauthorized` is terminal. Basic credentials are static, so an
/// `Unauthorized` with them is returned without a retry.
pub async fn with_reauth<T, F, Fut>(
    auth: &dyn Authenticator,
    config: &SyncConfig,
    action: &str,
    op: F,
) -> Result<T, RemoteError>
where
    F: Fn(Credential) -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let credential = credential_for(auth, config).await?;
    let stale = credential.bearer().cloned();

    let err = match op(credential).await {
        Err(err) if err.is_unauthorized() => err,
        other => return other,
    };

    let Some(stale) = stale else {
        warn!(action, error = %err, "Basic credentials rejected");
        return Err(err);
    };

    info!(action, phase = %SyncPhase::Refreshing, "Unauthorized, refreshing token and retrying once");
    let fresh = auth.refresh_if_current(config, Some(&stale)).await?;
    let result = op(Credential::Bearer(fresh)).await;
    if let Err(e) = &result {
        debug!(action, error = %e, "Retry after refresh failed");
    }
    result
}
