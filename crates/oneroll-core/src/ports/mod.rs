//! Port definitions (hexagonal architecture)
//!
//! Driven ports implemented by adapters in the outer crates:
//!
//! - [`RemoteBackend`] - listing and transfer against a broker or WebDAV server
//! - [`Authenticator`] - bearer token lifecycle
//! - [`PhotoStore`] - local photo partitions
//! - [`TokenStore`] - persistence of the bearer token across restarts

pub mod authenticator;
pub mod photo_store;
pub mod remote_backend;
pub mod token_store;

pub use authenticator::Authenticator;
pub use photo_store::PhotoStore;
pub use remote_backend::RemoteBackend;
pub use token_store::TokenStore;
