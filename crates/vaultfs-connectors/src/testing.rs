//! Testing utilities for vault connectors.
//!
//! Provides mock native handles, factories, object storage clients and
//! identity collaborators for unit and integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::auth::{Identity, IdentityDelegate};
use crate::error::FsError;
use crate::fs::obj_storage::ObjectStorageClient;
use crate::fs::{
    FileStatus, GlobListing, NativeFileSystem, NativeFsFactory, NativeHandle, RemoteFile, Status,
};
use crate::storage::properties::NativeConf;
use crate::vault::{Privilege, PrivilegeChecker};

type ErrorFn = Box<dyn Fn() -> FsError + Send + Sync>;

enum GlobBehavior {
    Matched(Vec<FileStatus>),
    Unmatched,
    Fail(ErrorFn),
}

/// Mock native handle with scripted glob results.
pub struct MockNativeFileSystem {
    behavior: GlobBehavior,
    glob_calls: AtomicUsize,
    close_calls: AtomicUsize,
    closed: AtomicBool,
}

impl MockNativeFileSystem {
    /// Creates a handle whose globs match nothing but succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Creates a handle whose globs return `entries`.
    #[must_use]
    pub fn with_entries(entries: Vec<FileStatus>) -> Self {
        Self::from_behavior(GlobBehavior::Matched(entries))
    }

    /// Creates a handle whose globs report a literal path that does not exist.
    #[must_use]
    pub fn unmatched() -> Self {
        Self::from_behavior(GlobBehavior::Unmatched)
    }

    /// Creates a handle whose globs fail with the error built by `make_error`.
    #[must_use]
    pub fn failing(make_error: impl Fn() -> FsError + Send + Sync + 'static) -> Self {
        Self::from_behavior(GlobBehavior::Fail(Box::new(make_error)))
    }

    fn from_behavior(behavior: GlobBehavior) -> Self {
        Self {
            behavior,
            glob_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns how many times `close` was called.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::Relaxed)
    }

    /// Returns how many globs were resolved.
    #[must_use]
    pub fn glob_count(&self) -> usize {
        self.glob_calls.load(Ordering::Relaxed)
    }
}

impl Default for MockNativeFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockNativeFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNativeFileSystem")
            .field("glob_calls", &self.glob_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl NativeFileSystem for MockNativeFileSystem {
    fn glob_status(&self, _pattern: &str) -> Result<Option<Vec<FileStatus>>, FsError> {
        self.glob_calls.fetch_add(1, Ordering::Relaxed);
        if self.is_closed() {
            return Err(FsError::io("Filesystem closed"));
        }
        match &self.behavior {
            GlobBehavior::Matched(entries) => Ok(Some(entries.clone())),
            GlobBehavior::Unmatched => Ok(None),
            GlobBehavior::Fail(make_error) => Err(make_error()),
        }
    }

    fn close(&self) -> Result<(), FsError> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Mock native factory that counts constructions.
///
/// Builds a fresh [`MockNativeFileSystem`] per call unless a fixed handle was
/// supplied. Can fail its first calls and delay every call.
#[derive(Debug)]
pub struct MockFsFactory {
    handle: Option<Arc<MockNativeFileSystem>>,
    fail_first: usize,
    delay: Duration,
    creates: AtomicUsize,
    last_handle: Mutex<Option<Arc<MockNativeFileSystem>>>,
    last_uri: Mutex<Option<String>>,
    last_conf: Mutex<Option<NativeConf>>,
}

impl MockFsFactory {
    /// Creates a factory that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: None,
            fail_first: 0,
            delay: Duration::ZERO,
            creates: AtomicUsize::new(0),
            last_handle: Mutex::new(None),
            last_uri: Mutex::new(None),
            last_conf: Mutex::new(None),
        }
    }

    /// Creates a factory that hands out `handle` on every call.
    #[must_use]
    pub fn with_handle(handle: MockNativeFileSystem) -> Self {
        Self {
            handle: Some(Arc::new(handle)),
            ..Self::new()
        }
    }

    /// Fails the first `n` calls with a transport error.
    #[must_use]
    pub fn fail_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Sleeps for `delay` inside every call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Returns the number of `create` calls, failed ones included.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Returns the last handle built.
    #[must_use]
    pub fn last_handle(&self) -> Option<Arc<MockNativeFileSystem>> {
        self.last_handle.lock().clone()
    }

    /// Returns the URI of the last call.
    #[must_use]
    pub fn last_uri(&self) -> Option<String> {
        self.last_uri.lock().clone()
    }

    /// Returns the native configuration of the last call.
    #[must_use]
    pub fn last_conf(&self) -> Option<NativeConf> {
        self.last_conf.lock().clone()
    }
}

impl Default for MockFsFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeFsFactory for MockFsFactory {
    fn create(&self, uri: &str, conf: &NativeConf) -> Result<NativeHandle, FsError> {
        let call = self.creates.fetch_add(1, Ordering::SeqCst);
        *self.last_uri.lock() = Some(uri.to_string());
        *self.last_conf.lock() = Some(conf.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if call < self.fail_first {
            return Err(FsError::io(format!("connection refused (attempt {})", call + 1)));
        }

        let handle = self
            .handle
            .clone()
            .unwrap_or_else(|| Arc::new(MockNativeFileSystem::new()));
        *self.last_handle.lock() = Some(Arc::clone(&handle));
        Ok(handle)
    }
}

/// Mock object storage client that counts calls.
#[derive(Debug, Default)]
pub struct MockObjectStorageClient {
    files: Vec<RemoteFile>,
    calls: AtomicUsize,
}

impl MockObjectStorageClient {
    /// Creates a client that lists nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client that lists `files`.
    #[must_use]
    pub fn with_files(files: Vec<RemoteFile>) -> Self {
        Self {
            files,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of listings served.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ObjectStorageClient for MockObjectStorageClient {
    fn glob_list(&self, _remote_path: &str, file_name_only: bool) -> GlobListing {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let files = self
            .files
            .iter()
            .cloned()
            .map(|mut f| {
                if file_name_only {
                    f.path = crate::storage::scheme::file_name(&f.path).to_string();
                }
                f
            })
            .collect();
        (Status::ok(), files)
    }
}

/// Privilege checker that grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminChecker;

impl PrivilegeChecker for AdminChecker {
    fn has_global_privilege(&self, _privilege: Privilege) -> bool {
        true
    }
}

/// Privilege checker that grants nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeniedChecker;

impl PrivilegeChecker for DeniedChecker {
    fn has_global_privilege(&self, _privilege: Privilege) -> bool {
        false
    }
}

/// Identity delegate that records assume/release calls.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    fail: bool,
    assumed: AtomicUsize,
    released: AtomicUsize,
    principals: Mutex<Vec<String>>,
}

impl RecordingDelegate {
    /// Creates a delegate that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a delegate whose assumptions always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Returns successful assumptions.
    #[must_use]
    pub fn assumed(&self) -> usize {
        self.assumed.load(Ordering::SeqCst)
    }

    /// Returns releases.
    #[must_use]
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Returns the principals assumed, in order.
    #[must_use]
    pub fn principals(&self) -> Vec<String> {
        self.principals.lock().clone()
    }
}

impl IdentityDelegate for RecordingDelegate {
    fn assume(&self, identity: &Identity) -> Result<(), FsError> {
        if self.fail {
            return Err(FsError::Authentication(format!(
                "cannot login as {}",
                identity.principal
            )));
        }
        self.assumed.fetch_add(1, Ordering::SeqCst);
        self.principals.lock().push(identity.principal.clone());
        Ok(())
    }

    fn release(&self, _identity: &Identity) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
