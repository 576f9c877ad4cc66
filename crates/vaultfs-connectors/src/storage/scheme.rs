//! Remote path parsing and scheme detection.
//!
//! [`StorageScheme`] identifies the backend family from a path URI, and
//! [`RemoteUri`] splits a path into scheme, authority (bucket or namenode)
//! and key.

use std::fmt;

use crate::config::VaultType;
use crate::error::FsError;

/// Backend family detected from a URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScheme {
    /// S3 and S3-compatible object stores.
    S3,
    /// Hadoop-compatible distributed filesystems.
    Hdfs,
    /// Local filesystem (`file://` or bare paths).
    Local,
}

/// Schemes served by the S3 protocol.
const S3_SCHEMES: &[&str] = &["s3", "s3a", "s3n", "oss", "cos", "cosn", "obs", "bos", "gs"];

/// Schemes served by the Hadoop client.
const HDFS_SCHEMES: &[&str] = &["hdfs", "viewfs", "ofs", "jfs"];

impl StorageScheme {
    /// Detects the scheme family of a path.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultfs_connectors::storage::StorageScheme;
    ///
    /// assert_eq!(StorageScheme::detect("s3://bucket/key"), StorageScheme::S3);
    /// assert_eq!(StorageScheme::detect("hdfs://nn:8020/warehouse"), StorageScheme::Hdfs);
    /// assert_eq!(StorageScheme::detect("/tmp/data"), StorageScheme::Local);
    /// ```
    #[must_use]
    pub fn detect(path: &str) -> Self {
        let Some((scheme, _)) = path.split_once("://") else {
            return Self::Local;
        };
        let lower = scheme.to_lowercase();
        if S3_SCHEMES.contains(&lower.as_str()) {
            Self::S3
        } else if HDFS_SCHEMES.contains(&lower.as_str()) {
            Self::Hdfs
        } else {
            Self::Local
        }
    }

    /// Returns true if paths of this family can be served by the backend.
    #[must_use]
    pub fn is_served_by(self, vault_type: VaultType) -> bool {
        matches!(
            (self, vault_type),
            (Self::S3, VaultType::S3) | (Self::Hdfs, VaultType::Hdfs)
        )
    }
}

/// A remote path split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUri {
    scheme: String,
    authority: String,
    key: String,
}

impl RemoteUri {
    /// Parses `scheme://authority/key`.
    ///
    /// The key keeps its inner slashes but loses leading and trailing ones.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Io` if the path has no scheme or no authority.
    pub fn parse(path: &str) -> Result<Self, FsError> {
        let (scheme, rest) = path
            .split_once("://")
            .ok_or_else(|| FsError::io(format!("No FileSystem for path without scheme: {path}")))?;
        let (authority, key) = rest.split_once('/').unwrap_or((rest, ""));
        if scheme.is_empty() || authority.is_empty() {
            return Err(FsError::io(format!("invalid remote path: {path}")));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            key: key.trim_matches('/').to_string(),
        })
    }

    /// Returns the scheme (`s3`, `hdfs`, ...).
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the bucket or namenode authority.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Returns the key within the authority, without surrounding slashes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.authority, self.key)
    }
}

/// Returns the final segment of a path string.
#[must_use]
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
