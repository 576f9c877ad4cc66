//! Glob listing dispatch.
//!
//! A [`GlobDispatcher`] lists wildcard patterns for one mount. Vaults that
//! carry a role ARN (`s3.role_arn` or `AWS_ROLE_ARN`) list through the object
//! storage client; all others list through the connector's native handle.
//! Listing failures are always folded into the returned [`Status`].

use std::sync::{Arc, OnceLock};

use tracing::{debug, error, info};

use crate::error::{FsError, VaultError};
use crate::fs::connector::RemoteFilesystemConnector;
use crate::fs::normalizer::ErrorNormalizer;
use crate::fs::obj_storage::{ObjectStorageClient, S3StorageClient};
use crate::fs::{GlobListing, Status};
use crate::storage::properties::is_role_arn_mode;

/// Routes glob listings to the native handle or the object storage client.
#[derive(Debug)]
pub struct GlobDispatcher {
    connector: Arc<RemoteFilesystemConnector>,
    object_client: OnceLock<Arc<dyn ObjectStorageClient>>,
    normalizer: Arc<ErrorNormalizer>,
    role_arn_mode: bool,
}

impl GlobDispatcher {
    /// Creates a dispatcher over a connector.
    ///
    /// The route is fixed here from the connector's properties.
    #[must_use]
    pub fn new(connector: Arc<RemoteFilesystemConnector>) -> Self {
        let role_arn_mode = is_role_arn_mode(connector.properties());
        Self {
            connector,
            object_client: OnceLock::new(),
            normalizer: Arc::new(ErrorNormalizer::new()),
            role_arn_mode,
        }
    }

    /// Creates a dispatcher that always lists through the native handle.
    #[must_use]
    pub fn native(connector: Arc<RemoteFilesystemConnector>) -> Self {
        Self {
            role_arn_mode: false,
            ..Self::new(connector)
        }
    }

    /// Uses the given object storage client instead of building one lazily.
    #[must_use]
    pub fn with_object_client(self, client: Arc<dyn ObjectStorageClient>) -> Self {
        Self {
            object_client: OnceLock::from(client),
            ..self
        }
    }

    /// Replaces the error normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<ErrorNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Returns the connector backing the native route.
    #[must_use]
    pub fn connector(&self) -> &Arc<RemoteFilesystemConnector> {
        &self.connector
    }

    /// Returns true if listings go through the object storage client.
    #[must_use]
    pub fn uses_object_client(&self) -> bool {
        self.role_arn_mode
    }

    /// Lists the entries matching `remote_path`.
    ///
    /// With `file_name_only` each descriptor carries only the final path
    /// segment. A pattern that matches nothing yields an OK status and no
    /// files.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Closed` once the connector has been closed. Every
    /// other failure is reported through the returned status.
    pub fn list(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError> {
        if self.connector.is_closed() {
            return Err(VaultError::Closed);
        }
        if self.role_arn_mode {
            info!(remote_path, "aws role arn mode, listing through object storage client");
            return Ok(self.object_client().glob_list(remote_path, file_name_only));
        }
        self.list_native(remote_path, file_name_only)
    }

    fn object_client(&self) -> &Arc<dyn ObjectStorageClient> {
        self.object_client.get_or_init(|| {
            let client: Arc<dyn ObjectStorageClient> = Arc::new(
                S3StorageClient::new(self.connector.properties())
                    .with_normalizer(Arc::clone(&self.normalizer)),
            );
            client
        })
    }

    fn list_native(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError> {
        let handle = match self.connector.acquire_handle(remote_path) {
            Ok(handle) => handle,
            Err(VaultError::Closed) => return Err(VaultError::Closed),
            Err(e) => {
                error!(remote_path, error = %e, "errors while get file status");
                let status = Status::common_error(format!("errors while get file status {e}"));
                return Ok((status, Vec::new()));
            }
        };

        match handle.glob_status(remote_path) {
            Ok(matched) => {
                let files: Vec<_> = matched
                    .unwrap_or_default()
                    .iter()
                    .map(|s| s.to_remote_file(file_name_only))
                    .collect();
                debug!(remote_path, result = ?files, "glob listed");
                Ok((Status::ok(), files))
            }
            Err(e) => Ok((self.failure(remote_path, &e), Vec::new())),
        }
    }

    fn failure(&self, remote_path: &str, err: &FsError) -> Status {
        let status = self.normalizer.normalize(err);
        if err.is_not_found() {
            info!(remote_path, "{}", status.message());
        } else {
            error!(remote_path, error = %err, "errors while get file status");
        }
        status
    }
}
