//! Backend variants of a vault filesystem.
//!
//! Every backend exposes the same [`RemoteFileSystem`] capabilities. The
//! variant is chosen once, from the validated vault type, by
//! [`VaultFileSystem::from_config`].

use std::sync::Arc;

use tracing::info;

use crate::config::{Properties, VaultConfig, VaultType};
use crate::error::{ConfigError, VaultError};
use crate::fs::connector::{ConnectorOptions, RemoteFilesystemConnector};
use crate::fs::glob::GlobDispatcher;
use crate::fs::obj_storage::ObjectStorageClient;
use crate::fs::registry::FsFactoryRegistry;
use crate::fs::{GlobListing, NativeFsFactory, NativeHandle};

/// Capabilities shared by all vault filesystems.
pub trait RemoteFileSystem: Send + Sync {
    /// Returns the backend type.
    fn vault_type(&self) -> VaultType;

    /// Returns the native handle, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Closed` after close, or `VaultError::Construction`
    /// if the handle cannot be built.
    fn acquire_handle(&self, path: &str) -> Result<NativeHandle, VaultError>;

    /// Lists the entries matching a wildcard pattern.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Closed` after close. Other failures are reported
    /// in the returned status.
    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError>;

    /// Releases the native handle. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the native handle failed to release.
    fn close(&self) -> Result<(), VaultError>;
}

/// S3 (and S3-compatible) vault filesystem.
#[derive(Debug)]
pub struct S3FileSystem {
    dispatcher: GlobDispatcher,
}

impl S3FileSystem {
    /// Creates the filesystem. Nothing is connected until first use.
    #[must_use]
    pub fn new(
        properties: Properties,
        factory: Arc<dyn NativeFsFactory>,
        options: ConnectorOptions,
    ) -> Self {
        let connector = RemoteFilesystemConnector::new(VaultType::S3, properties, factory, options);
        Self {
            dispatcher: GlobDispatcher::new(Arc::new(connector)),
        }
    }

    /// Uses the given client for role-assumption listings.
    #[must_use]
    pub fn with_object_client(self, client: Arc<dyn ObjectStorageClient>) -> Self {
        Self {
            dispatcher: self.dispatcher.with_object_client(client),
        }
    }

    /// Returns the listing dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &GlobDispatcher {
        &self.dispatcher
    }
}

impl RemoteFileSystem for S3FileSystem {
    fn vault_type(&self) -> VaultType {
        VaultType::S3
    }

    fn acquire_handle(&self, path: &str) -> Result<NativeHandle, VaultError> {
        self.dispatcher.connector().acquire_handle(path)
    }

    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError> {
        self.dispatcher.list(remote_path, file_name_only)
    }

    fn close(&self) -> Result<(), VaultError> {
        self.dispatcher.connector().close()
    }
}

/// Hadoop-compatible vault filesystem.
///
/// Always lists through the native handle. Kerberos-secured clusters are
/// reached by impersonating the configured principal.
#[derive(Debug)]
pub struct DfsFileSystem {
    dispatcher: GlobDispatcher,
}

impl DfsFileSystem {
    /// Creates the filesystem. Nothing is connected until first use.
    #[must_use]
    pub fn new(
        properties: Properties,
        factory: Arc<dyn NativeFsFactory>,
        options: ConnectorOptions,
    ) -> Self {
        let connector =
            RemoteFilesystemConnector::new(VaultType::Hdfs, properties, factory, options);
        Self {
            dispatcher: GlobDispatcher::native(Arc::new(connector)),
        }
    }

    /// Returns the listing dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &GlobDispatcher {
        &self.dispatcher
    }
}

impl RemoteFileSystem for DfsFileSystem {
    fn vault_type(&self) -> VaultType {
        VaultType::Hdfs
    }

    fn acquire_handle(&self, path: &str) -> Result<NativeHandle, VaultError> {
        self.dispatcher.connector().acquire_handle(path)
    }

    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError> {
        self.dispatcher.list(remote_path, file_name_only)
    }

    fn close(&self) -> Result<(), VaultError> {
        self.dispatcher.connector().close()
    }
}

/// The filesystem of one storage vault.
#[derive(Debug)]
pub enum VaultFileSystem {
    /// S3-compatible object storage.
    S3(S3FileSystem),
    /// Hadoop-compatible distributed filesystem.
    Dfs(DfsFileSystem),
}

impl VaultFileSystem {
    /// Builds the filesystem for a validated vault.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedVaultType` for an unknown backend.
    pub fn from_config(
        config: &VaultConfig,
        registry: &FsFactoryRegistry,
        options: ConnectorOptions,
    ) -> Result<Self, VaultError> {
        let vault_type = config.vault_type();
        let properties = config.shared_properties();
        let fs = match vault_type {
            VaultType::S3 => {
                VaultFileSystem::S3(S3FileSystem::new(properties, registry.factory(vault_type), options))
            }
            VaultType::Hdfs => VaultFileSystem::Dfs(DfsFileSystem::new(
                properties,
                registry.factory(vault_type),
                options,
            )),
            VaultType::Unknown => {
                return Err(ConfigError::UnsupportedVaultType(vault_type.to_string()).into());
            }
        };
        info!(vault = config.name(), vault_type = %vault_type, "vault filesystem created");
        Ok(fs)
    }

    fn inner(&self) -> &dyn RemoteFileSystem {
        match self {
            VaultFileSystem::S3(fs) => fs as &dyn RemoteFileSystem,
            VaultFileSystem::Dfs(fs) => fs as &dyn RemoteFileSystem,
        }
    }
}

impl RemoteFileSystem for VaultFileSystem {
    fn vault_type(&self) -> VaultType {
        self.inner().vault_type()
    }

    fn acquire_handle(&self, path: &str) -> Result<NativeHandle, VaultError> {
        self.inner().acquire_handle(path)
    }

    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> Result<GlobListing, VaultError> {
        self.inner().glob_list(remote_path, file_name_only)
    }

    fn close(&self) -> Result<(), VaultError> {
        self.inner().close()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::ConnectorState;
    use crate::fs::tracker::HandleTracker;
    use crate::fs::FileStatus;
    use crate::testing::{MockFsFactory, MockNativeFileSystem};

    fn config(vault_type: VaultType, props: &[(&str, &str)]) -> VaultConfig {
        let props: BTreeMap<String, String> = props
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        VaultConfig::new("v1".into(), vault_type, 0, 0, false, false, props)
    }

    fn options() -> ConnectorOptions {
        ConnectorOptions {
            tracker: Arc::new(HandleTracker::new()),
            ..ConnectorOptions::default()
        }
    }

    #[test]
    fn test_variant_follows_vault_type() {
        let registry = FsFactoryRegistry::with_defaults();
        let s3 = VaultFileSystem::from_config(
            &config(VaultType::S3, &[("type", "S3")]),
            &registry,
            options(),
        )
        .unwrap();
        assert!(matches!(s3, VaultFileSystem::S3(_)));
        assert_eq!(s3.vault_type(), VaultType::S3);

        let dfs = VaultFileSystem::from_config(
            &config(VaultType::Hdfs, &[("type", "hdfs")]),
            &registry,
            options(),
        )
        .unwrap();
        assert!(matches!(dfs, VaultFileSystem::Dfs(_)));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = VaultFileSystem::from_config(
            &config(VaultType::Unknown, &[]),
            &FsFactoryRegistry::with_defaults(),
            options(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::UnsupportedVaultType(_))
        ));
    }

    #[test]
    fn test_hdfs_without_factory_reports_construction_error() {
        let fs = VaultFileSystem::from_config(
            &config(VaultType::Hdfs, &[("type", "hdfs")]),
            &FsFactoryRegistry::with_defaults(),
            options(),
        )
        .unwrap();
        let err = fs.acquire_handle("hdfs://nn:8020/warehouse").unwrap_err();
        assert!(matches!(err, VaultError::Construction { .. }));
        assert!(err.to_string().starts_with("Failed to get HDFS FileSystem for"));
    }

    #[test]
    fn test_dfs_ignores_role_arn() {
        let registry = FsFactoryRegistry::new();
        let factory = Arc::new(MockFsFactory::with_handle(MockNativeFileSystem::with_entries(
            vec![FileStatus {
                path: "hdfs://nn:8020/warehouse/t1".into(),
                is_directory: true,
                len: 0,
                block_size: 134_217_728,
                modification_time: 1,
            }],
        )));
        registry.register(VaultType::Hdfs, factory.clone());

        let fs = VaultFileSystem::from_config(
            &config(VaultType::Hdfs, &[("type", "hdfs"), ("AWS_ROLE_ARN", "arn")]),
            &registry,
            options(),
        )
        .unwrap();
        let (status, files) = fs.glob_list("hdfs://nn:8020/warehouse/*", true).unwrap();
        assert!(status.is_ok());
        assert_eq!(files[0].path, "t1");
        assert_eq!(factory.create_count(), 1);
    }

    #[test]
    fn test_close_is_terminal() {
        let registry = FsFactoryRegistry::new();
        let factory = Arc::new(MockFsFactory::new());
        registry.register(VaultType::S3, factory.clone());
        let fs = VaultFileSystem::from_config(
            &config(VaultType::S3, &[("type", "S3")]),
            &registry,
            options(),
        )
        .unwrap();

        fs.glob_list("s3://bucket/a/*", false).unwrap();
        fs.close().unwrap();
        fs.close().unwrap();
        assert!(matches!(fs.glob_list("s3://bucket/a/*", false), Err(VaultError::Closed)));
        assert!(matches!(fs.acquire_handle("s3://bucket/a"), Err(VaultError::Closed)));
        if let VaultFileSystem::S3(s3) = &fs {
            assert_eq!(s3.dispatcher().connector().state(), ConnectorState::Closed);
        }
    }
}
