//! Domain newtypes with validation
//!
//! Remote listings are untrusted: a file or folder name reported by the
//! server ends up as a path component in a local partition. [`PhotoName`]
//! guarantees such a name is a single, non-traversing path segment.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A single path segment safe to use inside a local partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoName(String);

impl PhotoName {
    /// Creates a new PhotoName
    ///
    /// # Errors
    /// Returns error if the name is empty, `.`/`..`, or contains a path
    /// separator or NUL byte
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if !is_safe_segment(&name) {
            return Err(DomainError::InvalidFileName(name));
        }
        Ok(Self(name))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the name carries a `.jpg` suffix (any case)
    #[must_use]
    pub fn is_jpeg(&self) -> bool {
        has_jpeg_suffix(&self.0)
    }
}

/// Returns true if `name` is usable as a single local path segment
pub fn is_safe_segment(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Returns true if `name` ends with `.jpg`, ignoring case
pub fn has_jpeg_suffix(name: &str) -> bool {
    name.len() >= 4
        && name
            .get(name.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".jpg"))
}

impl Display for PhotoName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PhotoName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PhotoName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PhotoName> for String {
    fn from(name: PhotoName) -> Self {
        name.0
    }
}

impl AsRef<str> for PhotoName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
