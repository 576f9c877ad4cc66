//! Remote filesystem connectors.
//!
//! - [`connector`] - lazy, thread-safe native handle construction
//! - [`glob`] - listing dispatch between the native handle and the object client
//! - [`normalizer`] - listing error to [`Status`] mapping
//! - [`tracker`] - leak guard for native handles
//! - [`remote`] - backend variants (`S3`, `HDFS`) behind one capability trait
//! - [`object_store_fs`] - glob resolution over flat object listings
//! - [`s3`] / [`obj_storage`] - S3 SDK handle and role-assumption client

pub mod connector;
pub mod glob;
pub mod normalizer;
pub mod obj_storage;
pub mod object_store_fs;
pub mod registry;
pub mod remote;
pub mod s3;
pub mod tracker;

use std::fmt;
use std::sync::Arc;

use crate::error::FsError;
use crate::storage::properties::NativeConf;

pub use connector::{ConnectorOptions, RemoteFilesystemConnector};
pub use glob::GlobDispatcher;
pub use normalizer::{ErrorNormalizer, ErrorRule, VendorHeaderRule};
pub use obj_storage::{ObjectStorageClient, S3StorageClient};
pub use object_store_fs::{ObjectEntry, ObjectLister, ObjectStoreFileSystem, StoreLister};
pub use registry::FsFactoryRegistry;
pub use remote::{DfsFileSystem, RemoteFileSystem, S3FileSystem, VaultFileSystem};
pub use s3::{AssumedRole, S3Lister, S3NativeFsFactory, S3Settings};
pub use tracker::{HandleTracker, ReaperHandle};

/// Outcome code of a listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The call succeeded.
    Ok,
    /// The path does not exist.
    NotFound,
    /// Any other failure.
    CommonError,
}

/// Result status of a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: StatusCode,
    message: String,
}

impl Status {
    /// Creates a status.
    #[must_use]
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The success status.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    /// A not-found status.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    /// A generic failure status.
    #[must_use]
    pub fn common_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CommonError, message)
    }

    /// Returns the status code.
    #[must_use]
    pub fn code(&self) -> StatusCode {
        self.code
    }

    /// Returns the message (empty on success).
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true on success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::NotFound => write!(f, "NOT_FOUND: {}", self.message),
            StatusCode::CommonError => write!(f, "COMMON_ERROR: {}", self.message),
        }
    }
}

/// A listed remote file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Full path, or only the final segment when names were requested.
    pub path: String,
    /// False for directories.
    pub is_file: bool,
    /// Byte length, `-1` for directories.
    pub size: i64,
    /// Block size reported by the filesystem.
    pub block_size: i64,
    /// Modification time in milliseconds since the epoch.
    pub modification_time: i64,
}

/// A listing status and the matched files.
///
/// Files are only present when the status is OK, in listing order.
pub type GlobListing = (Status, Vec<RemoteFile>);

/// Stat metadata of an entry returned by a native handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Fully qualified path.
    pub path: String,
    /// True for directories (including synthesized prefixes).
    pub is_directory: bool,
    /// Byte length.
    pub len: i64,
    /// Block size.
    pub block_size: i64,
    /// Modification time in milliseconds since the epoch.
    pub modification_time: i64,
}

impl FileStatus {
    /// Converts into the listing descriptor.
    #[must_use]
    pub fn to_remote_file(&self, file_name_only: bool) -> RemoteFile {
        let path = if file_name_only {
            crate::storage::scheme::file_name(&self.path).to_string()
        } else {
            self.path.clone()
        };
        RemoteFile {
            path,
            is_file: !self.is_directory,
            size: if self.is_directory { -1 } else { self.len },
            block_size: self.block_size,
            modification_time: self.modification_time,
        }
    }
}

/// A native filesystem client bound to one backend.
///
/// Implementations are shared read-only between threads once published.
pub trait NativeFileSystem: Send + Sync + fmt::Debug {
    /// Resolves a wildcard pattern.
    ///
    /// Returns `None` when a pattern without wildcards names nothing.
    ///
    /// # Errors
    ///
    /// Returns `FsError::NotFound` when a required parent is missing, or any
    /// other `FsError` on transport or service failure.
    fn glob_status(&self, pattern: &str) -> Result<Option<Vec<FileStatus>>, FsError>;

    /// Releases native resources. Called at most once per handle.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing resources failed.
    fn close(&self) -> Result<(), FsError>;
}

/// Shared native filesystem handle.
pub type NativeHandle = Arc<dyn NativeFileSystem>;

/// Builds native filesystem handles.
pub trait NativeFsFactory: Send + Sync + fmt::Debug {
    /// Builds a handle able to serve `uri`.
    ///
    /// # Errors
    ///
    /// Returns an `FsError` if the handle cannot be built.
    fn create(&self, uri: &str, conf: &NativeConf) -> Result<NativeHandle, FsError>;
}
