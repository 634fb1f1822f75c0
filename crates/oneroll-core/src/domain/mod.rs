//! Domain types for OneRoll
//!
//! - Validated newtypes for names that end up on the local filesystem
//! - Bearer tokens and the credential attached to every remote call
//! - Remote items as normalized by both listing protocols
//! - The immutable per-pass sync configuration
//! - The remote error taxonomy

pub mod errors;
pub mod item;
pub mod newtypes;
pub mod sync_config;
pub mod token;

pub use errors::{DomainError, ErrorKind, RemoteError};
pub use item::{ByteStream, ListScope, LocalPhotoRecord, Partition, RemoteItem};
pub use newtypes::PhotoName;
pub use sync_config::{BackendKind, CredentialMode, SyncConfig};
pub use token::{AuthToken, Credential};
