//! Glob resolution over flat object listings.
//!
//! Object stores have no directories, so a glob is resolved by listing the
//! literal prefix of the pattern and synthesizing directory entries from
//! deeper keys. Wildcards never cross a `/`.
//!
//! The listing itself goes through an [`ObjectLister`]. [`StoreLister`]
//! adapts any `object_store` store; the S3 lister lives in [`crate::fs::s3`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use globset::{GlobBuilder, GlobMatcher};
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore};
use tracing::debug;

use crate::error::FsError;
use crate::fs::{FileStatus, NativeFileSystem};
use crate::runtime::run_blocking;
use crate::storage::scheme::RemoteUri;

/// Block size reported when `fs.s3a.block.size` is not configured (32 MiB).
pub const DEFAULT_BLOCK_SIZE: i64 = 32 * 1024 * 1024;

const GLOB_CHARS: &[char] = &['*', '?', '[', '{'];

fn has_glob(segment: &str) -> bool {
    segment.contains(GLOB_CHARS)
}

/// Compiles one path pattern. `[^..]` negation is accepted as well as `[!..]`.
fn compile(pattern: &str) -> Result<GlobMatcher, FsError> {
    GlobBuilder::new(&pattern.replace("[^", "[!"))
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| FsError::io_with_source(format!("invalid glob pattern: {pattern}"), e))
}

/// One object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Key within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size: i64,
    /// Last modification, milliseconds since the epoch.
    pub last_modified: i64,
}

/// Flat key listing of one bucket.
#[async_trait]
pub trait ObjectLister: Send + Sync + fmt::Debug {
    /// Returns the object stored under exactly `key`, if any.
    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, FsError>;

    /// Returns every object below the directory `prefix` (`""` for the whole
    /// bucket). A prefix with nothing below it yields an empty list.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, FsError>;
}

/// [`ObjectLister`] over an `object_store` store.
#[derive(Debug, Clone)]
pub struct StoreLister {
    store: Arc<dyn ObjectStore>,
}

impl StoreLister {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

fn store_entry(meta: &ObjectMeta) -> Result<ObjectEntry, FsError> {
    let key = meta.location.to_string();
    let size = i64::try_from(meta.size).map_err(|_| FsError::io(format!("object too large: {key}")))?;
    Ok(ObjectEntry {
        key,
        size,
        last_modified: meta.last_modified.timestamp_millis(),
    })
}

#[async_trait]
impl ObjectLister for StoreLister {
    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, FsError> {
        match self.store.head(&ObjectPath::from(key)).await {
            Ok(meta) => store_entry(&meta).map(Some),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, FsError> {
        let prefix = (!prefix.is_empty()).then(|| ObjectPath::from(prefix));
        match self.store.list(prefix.as_ref()).try_collect::<Vec<_>>().await {
            Ok(metas) => metas.iter().map(store_entry).collect(),
            Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A native handle bound to one bucket of an object store.
pub struct ObjectStoreFileSystem {
    lister: Arc<dyn ObjectLister>,
    scheme: String,
    bucket: String,
    block_size: i64,
    closed: AtomicBool,
}

impl ObjectStoreFileSystem {
    /// Wraps an `object_store` store serving `scheme://bucket/...` paths.
    #[must_use]
    pub fn new(
        store: Arc<dyn ObjectStore>,
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        block_size: i64,
    ) -> Self {
        Self::with_lister(Arc::new(StoreLister::new(store)), scheme, bucket, block_size)
    }

    /// Serves `scheme://bucket/...` paths from any lister.
    #[must_use]
    pub fn with_lister(
        lister: Arc<dyn ObjectLister>,
        scheme: impl Into<String>,
        bucket: impl Into<String>,
        block_size: i64,
    ) -> Self {
        Self {
            lister,
            scheme: scheme.into(),
            bucket: bucket.into(),
            block_size,
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the bucket this handle serves.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns the reported block size.
    #[must_use]
    pub fn block_size(&self) -> i64 {
        self.block_size
    }

    /// Returns true once the handle has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_fs(&self, uri: &RemoteUri, pattern: &str) -> Result<(), FsError> {
        if uri.scheme().eq_ignore_ascii_case(&self.scheme) && uri.authority() == self.bucket {
            return Ok(());
        }
        Err(FsError::io(format!(
            "Wrong FS: {pattern}, expected: {}://{}",
            self.scheme, self.bucket
        )))
    }

    fn qualify(&self, key: &str) -> String {
        format!("{}://{}/{key}", self.scheme, self.bucket)
    }

    fn file_status(&self, key: &str, entry: &ObjectEntry) -> FileStatus {
        FileStatus {
            path: self.qualify(key),
            is_directory: false,
            len: entry.size,
            block_size: self.block_size,
            modification_time: entry.last_modified,
        }
    }

    fn dir_status(&self, key: &str) -> FileStatus {
        FileStatus {
            path: self.qualify(key),
            is_directory: true,
            len: 0,
            block_size: self.block_size,
            modification_time: 0,
        }
    }

    /// Stats a pattern without wildcards: an object, a prefix, or nothing.
    async fn stat_literal(&self, key: &str) -> Result<Option<Vec<FileStatus>>, FsError> {
        if let Some(entry) = self.lister.head(key).await? {
            return Ok(Some(vec![self.file_status(key, &entry)]));
        }
        let children = self.lister.list(key).await?;
        Ok((!children.is_empty()).then(|| vec![self.dir_status(key)]))
    }

    async fn expand(&self, segments: &[&str], first_glob: usize) -> Result<Vec<FileStatus>, FsError> {
        let depth = segments.len();
        let matcher = compile(&segments.join("/"))?;
        let entries = self.lister.list(&segments[..first_glob].join("/")).await?;

        // Files shadow a prefix of the same name.
        let mut matched: BTreeMap<String, FileStatus> = BTreeMap::new();
        for entry in &entries {
            let parts: Vec<&str> = entry.key.split('/').collect();
            if parts.len() < depth || parts[..depth].iter().any(|p| p.is_empty()) {
                continue;
            }
            let candidate = parts[..depth].join("/");
            if !matcher.is_match(&candidate) {
                continue;
            }
            if parts.len() > depth {
                matched
                    .entry(candidate.clone())
                    .or_insert_with(|| self.dir_status(&candidate));
            } else {
                let status = self.file_status(&candidate, entry);
                matched.insert(candidate, status);
            }
        }
        Ok(matched.into_values().collect())
    }
}

impl NativeFileSystem for ObjectStoreFileSystem {
    fn glob_status(&self, pattern: &str) -> Result<Option<Vec<FileStatus>>, FsError> {
        if self.is_closed() {
            return Err(FsError::io("Filesystem closed"));
        }
        let uri = RemoteUri::parse(pattern)?;
        self.check_fs(&uri, pattern)?;

        let segments: Vec<&str> = uri.key().split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Ok(Some(vec![self.dir_status("")]));
        }
        let first_glob = segments.iter().position(|s| has_glob(s));

        let segments = segments.as_slice();
        let result = run_blocking(move || async move {
            match first_glob {
                None => self.stat_literal(&segments.join("/")).await,
                Some(i) => self.expand(segments, i).await.map(Some),
            }
        })?;
        debug!(
            pattern,
            matched = result.as_ref().map_or(0, Vec::len),
            "glob resolved"
        );
        Ok(result)
    }

    fn close(&self) -> Result<(), FsError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(bucket = %self.bucket, "object store handle closed");
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectStoreFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreFileSystem")
            .field("lister", &self.lister)
            .field("scheme", &self.scheme)
            .field("bucket", &self.bucket)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}
