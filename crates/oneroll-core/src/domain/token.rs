//! Authentication material
//!
//! [`AuthToken`] is the bearer token obtained by enrolling against the broker.
//! [`Credential`] is what a remote call actually attaches: either that token
//! or static basic-auth material for WebDAV servers.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bearer token with an optional absolute expiry
///
/// A token is replaced wholesale on refresh, never partially updated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// The opaque bearer token
    pub token: String,
    /// Absolute expiry; `None` means the token never expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    /// Creates a new token
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// Returns true if the token is usable at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            None => true,
            Some(expiry) => now < expiry,
        }
    }

    /// Returns true if the token is usable now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Credential attached to a remote call
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static HTTP basic auth (WebDAV)
    Basic { username: String, password: String },
    /// Enrollment token (broker)
    Bearer(AuthToken),
}

impl Credential {
    /// Renders the `Authorization` header value
    pub fn authorization_header(&self) -> String {
        match self {
            Credential::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
            Credential::Bearer(token) => format!("Bearer {}", token.token),
        }
    }

    /// Returns the bearer token, if this is a bearer credential
    pub fn bearer(&self) -> Option<&AuthToken> {
        match self {
            Credential::Bearer(token) => Some(token),
            Credential::Basic { .. } => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Credential::Bearer(token) => f.debug_tuple("Bearer").field(token).finish(),
        }
    }
}
