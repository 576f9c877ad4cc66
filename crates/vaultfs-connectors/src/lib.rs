//! # Vault Filesystem Connectors
//!
//! Storage vault declarations and remote filesystem connectors for object
//! storage (S3 and S3-compatible services) and Hadoop-compatible
//! filesystems.
//!
//! - [`vault`] - `CREATE STORAGE VAULT` validation into a [`config::VaultConfig`]
//! - [`fs`] - lazy native handles, glob listing dispatch, error normalization
//! - [`storage`] - property conversion, secret masking, path parsing
//! - [`auth`] - simple and impersonated authentication contexts
//! - [`sdk`] - retry helpers
//! - [`testing`] - mock collaborators and test utilities
//!
//! ## Architecture
//!
//! ```text
//! CREATE STORAGE VAULT --analyze--> VaultConfig
//!                                        |
//!                          VaultFileSystem::from_config
//!                                        |
//!                     +------------------+-----------------+
//!                     |                                    |
//!              role ARN present                      otherwise
//!                     |                                    |
//!          ObjectStorageClient              RemoteFilesystemConnector
//!                     |                       (lazy native handle)
//!                     +---------> (Status, files) <--------+
//!                                  ErrorNormalizer
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::unreadable_literal,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        unused_mut
    )
)]

/// Error types.
pub mod error;

/// Vault configuration and lifecycle types.
pub mod config;

/// Authentication contexts for native calls.
pub mod auth;

/// Storage property infrastructure.
pub mod storage;

/// Storage vault declarations.
pub mod vault;

/// Remote filesystem connectors.
pub mod fs;

/// Connector SDK helpers.
pub mod sdk;

/// Blocking bridge for async storage clients.
pub mod runtime;

/// Testing utilities (mock handles, factories, clients).
pub mod testing;

pub use config::{ConnectorState, Properties, VaultConfig, VaultType};
pub use error::{ConfigError, FsError, ServiceError, VaultError};
pub use fs::{
    ConnectorOptions, ErrorNormalizer, FsFactoryRegistry, GlobDispatcher, GlobListing,
    RemoteFile, RemoteFileSystem, RemoteFilesystemConnector, Status, StatusCode,
    VaultFileSystem,
};
pub use vault::{CreateStorageVault, ValidatorOptions};
