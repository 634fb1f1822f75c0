//! OneRoll Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `AuthToken`, `Credential`, `RemoteItem`, `SyncConfig`,
//!   and the remote error taxonomy (`RemoteError`, `ErrorKind`)
//! - **Port definitions** - Traits for adapters: `RemoteBackend`,
//!   `Authenticator`, `PhotoStore`, `TokenStore`
//! - **Configuration** - The YAML configuration file model
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces that the protocol adapters (`oneroll-remote`) and the local
//! storage adapter (`oneroll-sync`) implement. The sync engine only talks to
//! ports, so the broker and WebDAV backends are interchangeable at
//! construction time.

pub mod config;
pub mod domain;
pub mod ports;
