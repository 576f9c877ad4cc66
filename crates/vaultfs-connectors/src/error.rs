//! Connector error types.
//!
//! Provides the error hierarchy used across the crate:
//! - `ConfigError`: malformed or missing vault properties (declaration time)
//! - `VaultError`: top-level error for vault and connector operations
//! - `FsError`: failures raised by a native filesystem handle
//! - `ServiceError`: a vendor storage-service response carrying headers

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::config::VaultType;

/// Errors raised while validating a storage vault declaration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The property map was empty.
    #[error("Storage Vault properties can't be null")]
    EmptyProperties,

    /// A required property is absent.
    #[error("Missing property {0}")]
    MissingProperty(String),

    /// A required property is present but empty.
    #[error("Property {0} cannot be empty")]
    EmptyProperty(String),

    /// The `type` property does not name a known backend.
    #[error("Unsupported Storage Vault type: {0}")]
    UnsupportedVaultType(String),

    /// A property value could not be parsed.
    #[error("invalid value for '{key}': {message}")]
    InvalidProperty {
        /// The offending key.
        key: String,
        /// Parse failure details.
        message: String,
    },

    /// The vault name does not follow the naming rules.
    #[error("Incorrect storage vault name '{0}'")]
    InvalidName(String),

    /// The declaration surface is disabled for this deployment.
    #[error("{0}")]
    Unsupported(String),
}

/// Errors that can occur during vault and connector operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Invalid vault configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The caller lacks the required privilege.
    #[error("Access denied; you need (at least one of) the {0} privilege(s) for this operation")]
    Authorization(String),

    /// The connector has been closed.
    #[error("FileSystem is closed.")]
    Closed,

    /// The native filesystem handle could not be built.
    #[error("{message}")]
    Construction {
        /// Human-readable summary.
        message: String,
        /// The root cause reported by the native layer.
        #[source]
        source: FsError,
    },
}

impl VaultError {
    /// Wraps a native construction failure for the given backend.
    #[must_use]
    pub fn construction(vault_type: VaultType, source: FsError) -> Self {
        VaultError::Construction {
            message: format!("Failed to get {vault_type} FileSystem for {source}"),
            source,
        }
    }

    /// Returns true if this error is the terminal closed state.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, VaultError::Closed)
    }
}

/// Errors raised by a native filesystem handle.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path (or one of its parents) does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The storage service rejected the request.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Transport or I/O failure, optionally with an underlying cause.
    #[error("{message}")]
    Io {
        /// Human-readable summary.
        message: String,
        /// The underlying error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// Identity assumption or credential exchange failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The operation is not available for this backend.
    #[error("{0}")]
    Unsupported(String),
}

impl FsError {
    /// Creates an I/O error without an underlying cause.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        FsError::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an I/O error wrapping an underlying cause.
    #[must_use]
    pub fn io_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FsError::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for the file-not-found class of errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }
}

impl From<object_store::Error> for FsError {
    fn from(e: object_store::Error) -> Self {
        match e {
            object_store::Error::NotFound { path, .. } => FsError::NotFound(path),
            other => FsError::io_with_source(other.to_string(), other),
        }
    }
}

/// An error response from an S3-compatible storage service.
///
/// Keeps the raw response headers so that vendor-specific diagnostics
/// (for example MinIO's `X-Minio-Error-Desc`) can be surfaced later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceError {
    /// HTTP status code of the response.
    pub status: u16,
    /// Vendor error code (e.g. `AccessDenied`).
    pub code: String,
    /// Vendor error message.
    pub message: String,
    /// Response headers as returned by the service.
    pub headers: HashMap<String, String>,
}

impl ServiceError {
    /// Creates a service error without headers.
    #[must_use]
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            headers: HashMap::new(),
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Looks up a header, ignoring ASCII case in the name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Status Code: {}; Error Code: {})",
            self.message, self.status, self.code
        )
    }
}

impl std::error::Error for ServiceError {}
