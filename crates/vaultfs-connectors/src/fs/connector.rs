//! Remote filesystem connector.
//!
//! [`RemoteFilesystemConnector`] owns the lazily-built native handle of one
//! storage mount. Construction is single-flight: concurrent first callers
//! collapse into one native construction, and only success is memoized. A
//! failed construction leaves the connector `Uninitialized` so a later call
//! can try again.
//!
//! ```text
//!  Uninitialized --(build ok)--> Ready
//!        ^    \                    |
//!        |     `-(build failed)    |
//!        `---------'               |
//!   (any) ---------close()-------> Closed   (terminal)
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{AuthenticationContext, IdentityDelegate};
use crate::config::{ConnectorState, Properties, VaultType};
use crate::error::{FsError, VaultError};
use crate::fs::tracker::HandleTracker;
use crate::fs::{NativeFsFactory, NativeHandle};
use crate::sdk::retry::{retry_blocking, RetryPolicy};
use crate::storage::properties::PropertyConverter;
use crate::storage::scheme::StorageScheme;

static NEXT_CONNECTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Tuning knobs for a connector.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    /// Retry policy for a single construction attempt. Defaults to no retry.
    pub construction_retry: RetryPolicy,
    /// Tracker that guards against leaked handles.
    pub tracker: Arc<HandleTracker>,
    /// Delegate used by impersonating authentication contexts.
    pub identity_delegate: Option<Arc<dyn IdentityDelegate>>,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            construction_retry: RetryPolicy::none(),
            tracker: HandleTracker::global(),
            identity_delegate: None,
        }
    }
}

struct ConnectorShared {
    id: u64,
    vault_type: VaultType,
    properties: Properties,
    factory: Arc<dyn NativeFsFactory>,
    options: ConnectorOptions,
    state: AtomicU8,
    handle: OnceLock<NativeHandle>,
    init_lock: Mutex<()>,
}

/// Lazily builds and owns the native filesystem handle of one mount.
pub struct RemoteFilesystemConnector {
    shared: Arc<ConnectorShared>,
}

impl RemoteFilesystemConnector {
    /// Creates a connector. No native resources are allocated until the
    /// first [`RemoteFilesystemConnector::acquire_handle`].
    #[must_use]
    pub fn new(
        vault_type: VaultType,
        properties: Properties,
        factory: Arc<dyn NativeFsFactory>,
        options: ConnectorOptions,
    ) -> Self {
        Self {
            shared: Arc::new(ConnectorShared {
                id: NEXT_CONNECTOR_ID.fetch_add(1, Ordering::Relaxed),
                vault_type,
                properties,
                factory,
                options,
                state: AtomicU8::new(ConnectorState::Uninitialized.as_u8()),
                handle: OnceLock::new(),
                init_lock: Mutex::new(()),
            }),
        }
    }

    /// Returns the unique id of this connector (its tracker key).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Returns the backend type.
    #[must_use]
    pub fn vault_type(&self) -> VaultType {
        self.shared.vault_type
    }

    /// Returns the vault properties this connector was built from.
    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.shared.properties
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        ConnectorState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns true once [`RemoteFilesystemConnector::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ConnectorState::Closed
    }

    /// Returns the native handle, building it on first use.
    ///
    /// `path_hint` selects the bucket or namenode the handle is bound to.
    ///
    /// # Errors
    ///
    /// - `VaultError::Closed` once the connector has been closed
    /// - `VaultError::Construction` if the native handle cannot be built; the
    ///   connector stays `Uninitialized` and the next call retries
    pub fn acquire_handle(&self, path_hint: &str) -> Result<NativeHandle, VaultError> {
        if let Some(handle) = self.published() {
            return Ok(handle);
        }
        if self.is_closed() {
            return Err(VaultError::Closed);
        }

        let _guard = self.shared.init_lock.lock();
        if self.is_closed() {
            return Err(VaultError::Closed);
        }
        if let Some(handle) = self.published() {
            return Ok(handle);
        }

        let handle = self.build(path_hint).map_err(|e| {
            warn!(
                connector = self.shared.id,
                vault_type = %self.shared.vault_type,
                error = %e,
                "failed to build native filesystem handle"
            );
            VaultError::construction(self.shared.vault_type, e)
        })?;

        // A close that raced the build has already flipped the state.
        if self
            .shared
            .state
            .compare_exchange(
                ConnectorState::Uninitialized.as_u8(),
                ConnectorState::Ready.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            if let Err(e) = handle.close() {
                warn!(connector = self.shared.id, error = %e, "failed to close unpublished handle");
            }
            return Err(VaultError::Closed);
        }

        // Published exactly once: the init lock is held and the cell was empty.
        let handle = Arc::clone(self.shared.handle.get_or_init(|| handle));
        let owner: Weak<dyn Any + Send + Sync> = {
            let weak: Weak<ConnectorShared> = Arc::downgrade(&self.shared);
            weak
        };
        self.shared
            .options
            .tracker
            .register(self.shared.id, owner, Arc::clone(&handle));

        info!(
            connector = self.shared.id,
            vault_type = %self.shared.vault_type,
            path = path_hint,
            "native filesystem handle ready"
        );
        Ok(handle)
    }

    /// Closes the connector and releases its native handle.
    ///
    /// Idempotent. Every later call fails with `VaultError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Construction` carrying the native error if the
    /// handle failed to release; the connector is closed regardless.
    pub fn close(&self) -> Result<(), VaultError> {
        let previous = self
            .shared
            .state
            .swap(ConnectorState::Closed.as_u8(), Ordering::AcqRel);
        if ConnectorState::from_u8(previous) == ConnectorState::Closed {
            return Ok(());
        }

        // Wait for an in-flight construction so its handle is released too.
        let _guard = self.shared.init_lock.lock();
        self.shared.options.tracker.deregister(self.shared.id);

        let Some(handle) = self.shared.handle.get() else {
            info!(connector = self.shared.id, "connector closed before first use");
            return Ok(());
        };
        info!(connector = self.shared.id, "closing native filesystem handle");
        handle
            .close()
            .map_err(|e| VaultError::construction(self.shared.vault_type, e))
    }

    fn published(&self) -> Option<NativeHandle> {
        if self.state() != ConnectorState::Ready {
            return None;
        }
        self.shared.handle.get().cloned()
    }

    fn build(&self, path_hint: &str) -> Result<NativeHandle, FsError> {
        let shared = &self.shared;

        let scheme = StorageScheme::detect(path_hint);
        if !scheme.is_served_by(shared.vault_type) {
            return Err(FsError::io(format!(
                "Wrong FS: {path_hint}, expected a {} path",
                shared.vault_type
            )));
        }

        let conf = PropertyConverter::to_native_conf(shared.vault_type, &shared.properties);
        let auth = AuthenticationContext::for_backend(
            shared.vault_type,
            &conf,
            shared.options.identity_delegate.as_ref(),
        )?;
        debug!(
            connector = shared.id,
            auth_mode = %auth.mode(),
            conf = ?conf,
            "building native filesystem handle"
        );

        retry_blocking(
            &shared.options.construction_retry,
            || auth.run_as(|| shared.factory.create(path_hint, &conf)),
            |attempt, e| {
                debug!(connector = shared.id, attempt, error = %e, "construction attempt failed");
            },
        )
    }
}

impl Drop for RemoteFilesystemConnector {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(connector = self.shared.id, error = %e, "failed to close connector on drop");
        }
    }
}

impl fmt::Debug for RemoteFilesystemConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFilesystemConnector")
            .field("id", &self.shared.id)
            .field("vault_type", &self.shared.vault_type)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
