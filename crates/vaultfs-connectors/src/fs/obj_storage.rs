//! Object storage client used for role-assumption listings.
//!
//! The native handle cannot present an external id when assuming a role, so
//! vaults configured with a role ARN list through an [`ObjectStorageClient`]
//! instead. The client reports errors through the same [`Status`] contract.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use object_store::ObjectStore;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::VaultType;
use crate::error::FsError;
use crate::fs::normalizer::ErrorNormalizer;
use crate::fs::object_store_fs::{ObjectStoreFileSystem, DEFAULT_BLOCK_SIZE};
use crate::fs::s3::{AssumedRole, S3NativeFsFactory, S3Settings};
use crate::fs::{GlobListing, NativeFileSystem, RemoteFile, Status};
use crate::storage::properties::{NativeConf, PropertyConverter, FS_S3A_BLOCK_SIZE};
use crate::storage::scheme::RemoteUri;

/// Lists remote paths through a vendor storage SDK.
pub trait ObjectStorageClient: Send + Sync + fmt::Debug {
    /// Resolves a wildcard pattern.
    ///
    /// Never fails: errors are reported in the returned status, and files are
    /// only returned with an OK status.
    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> GlobListing;
}

/// [`ObjectStorageClient`] backed by the S3 SDK, one client per bucket.
///
/// A role ARN in the vault properties (`s3.role_arn` / `AWS_ROLE_ARN`) is
/// assumed through STS with the vault's external id (`s3.external_id` /
/// `AWS_EXTERNAL_ID`). Static keys, when present, are the identity that
/// assumes it.
pub struct S3StorageClient {
    conf: NativeConf,
    normalizer: Arc<ErrorNormalizer>,
    stores: Mutex<HashMap<String, Arc<ObjectStoreFileSystem>>>,
}

impl S3StorageClient {
    /// Creates a client from vault properties.
    #[must_use]
    pub fn new(properties: &BTreeMap<String, String>) -> Self {
        let conf = PropertyConverter::to_native_conf(VaultType::S3, properties);
        match AssumedRole::from_conf(&conf) {
            Some(role) => debug!(
                role_arn = %role.role_arn,
                external_id = role.external_id.is_some(),
                "object storage client configured for role assumption"
            ),
            None => warn!("object storage client has no role to assume, using vault credentials"),
        }
        Self {
            conf,
            normalizer: Arc::new(ErrorNormalizer::new()),
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the error normalizer.
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: Arc<ErrorNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Serves `scheme://bucket/...` from an existing store.
    #[must_use]
    pub fn with_store(self, scheme: &str, bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        let block_size = self.block_size();
        self.stores.lock().insert(
            cache_key(scheme, bucket),
            Arc::new(ObjectStoreFileSystem::new(store, scheme, bucket, block_size)),
        );
        self
    }

    /// Returns the role this client assumes, if any.
    #[must_use]
    pub fn assumed_role(&self) -> Option<AssumedRole> {
        AssumedRole::from_conf(&self.conf)
    }

    fn block_size(&self) -> i64 {
        self.conf
            .get_parsed::<i64>(FS_S3A_BLOCK_SIZE)
            .ok()
            .flatten()
            .unwrap_or(DEFAULT_BLOCK_SIZE)
    }

    fn store_for(&self, remote_path: &str, uri: &RemoteUri) -> Result<Arc<ObjectStoreFileSystem>, FsError> {
        let key = cache_key(uri.scheme(), uri.authority());
        if let Some(fs) = self.stores.lock().get(&key) {
            return Ok(Arc::clone(fs));
        }

        let settings = S3Settings::from_conf(&self.conf)?;
        let fs = S3NativeFsFactory::handle(remote_path, &settings)?;
        info!(bucket = uri.authority(), "object storage client connected");
        Ok(Arc::clone(self.stores.lock().entry(key).or_insert(fs)))
    }

    fn list(&self, remote_path: &str, file_name_only: bool) -> Result<Vec<RemoteFile>, FsError> {
        let uri = RemoteUri::parse(remote_path)?;
        let fs = self.store_for(remote_path, &uri)?;
        let statuses = fs.glob_status(remote_path)?.unwrap_or_default();
        Ok(statuses
            .iter()
            .map(|s| s.to_remote_file(file_name_only))
            .collect())
    }
}

fn cache_key(scheme: &str, bucket: &str) -> String {
    format!("{}://{bucket}", scheme.to_lowercase())
}

impl ObjectStorageClient for S3StorageClient {
    fn glob_list(&self, remote_path: &str, file_name_only: bool) -> GlobListing {
        match self.list(remote_path, file_name_only) {
            Ok(files) => {
                debug!(remote_path, files = files.len(), "object storage glob listed");
                (Status::ok(), files)
            }
            Err(FsError::NotFound(detail)) => {
                (Status::not_found(format!("file not found: {detail}")), Vec::new())
            }
            Err(e) => {
                let message = self
                    .normalizer
                    .vendor_message(&e)
                    .unwrap_or_else(|| format!("errors while glob file {e}"));
                (Status::common_error(message), Vec::new())
            }
        }
    }
}

impl fmt::Debug for S3StorageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3StorageClient")
            .field("conf", &self.conf)
            .field("buckets", &self.stores.lock().keys().cloned().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use object_store::local::LocalFileSystem;

    use super::*;
    use crate::error::ServiceError;
    use crate::fs::object_store_fs::{ObjectEntry, ObjectLister};
    use crate::fs::StatusCode;

    fn client_over(dir: &std::path::Path) -> S3StorageClient {
        let mut props = BTreeMap::new();
        props.insert("s3.role_arn".to_string(), "arn:aws:iam::1:role/r".to_string());
        props.insert("s3.external_id".to_string(), "ext".to_string());
        let store = LocalFileSystem::new_with_prefix(dir).unwrap();
        S3StorageClient::new(&props).with_store("s3", "bucket", Arc::new(store))
    }

    #[test]
    fn test_lists_through_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();
        std::fs::write(dir.path().join("logs/2024.log"), b"abc").unwrap();
        std::fs::write(dir.path().join("logs/2025.log"), b"abcd").unwrap();

        let client = client_over(dir.path());
        let (status, files) = client.glob_list("s3://bucket/logs/*.log", true);
        assert!(status.is_ok());
        let names: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["2024.log", "2025.log"]);
        assert_eq!(files[1].size, 4);
        assert_eq!(files[0].block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_no_match_is_empty_ok() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_over(dir.path());
        let (status, files) = client.glob_list("s3://bucket/none.csv", false);
        assert!(status.is_ok());
        assert!(files.is_empty());
    }

    #[test]
    fn test_failures_become_common_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = client_over(dir.path());
        let (status, files) = client.glob_list("bucket/no-scheme/*", false);
        assert_eq!(status.code(), StatusCode::CommonError);
        assert!(status.message().starts_with("errors while glob file "));
        assert!(files.is_empty());
    }

    #[test]
    fn test_role_and_external_id_come_from_vault() {
        let mut props = BTreeMap::new();
        props.insert("AWS_ROLE_ARN".to_string(), "arn:aws:iam::1:role/reader".to_string());
        props.insert("AWS_EXTERNAL_ID".to_string(), "tenant-7".to_string());
        let role = S3StorageClient::new(&props).assumed_role().unwrap();
        assert_eq!(role.role_arn, "arn:aws:iam::1:role/reader");
        assert_eq!(role.external_id.as_deref(), Some("tenant-7"));

        let client = client_over(tempfile::tempdir().unwrap().path());
        assert_eq!(
            client.assumed_role(),
            Some(AssumedRole {
                role_arn: "arn:aws:iam::1:role/r".into(),
                external_id: Some("ext".into()),
            })
        );
        assert!(S3StorageClient::new(&BTreeMap::new()).assumed_role().is_none());
    }

    #[test]
    fn test_vendor_header_becomes_message() {
        #[derive(Debug)]
        struct Rejecting;

        #[async_trait::async_trait]
        impl ObjectLister for Rejecting {
            async fn head(&self, _key: &str) -> Result<Option<ObjectEntry>, FsError> {
                Err(rejected())
            }

            async fn list(&self, _prefix: &str) -> Result<Vec<ObjectEntry>, FsError> {
                Err(rejected())
            }
        }

        fn rejected() -> FsError {
            FsError::io_with_source(
                "listStatus on s3://bucket/",
                ServiceError::new(403, "AccessDenied", "Access Denied.")
                    .with_header("X-Minio-Error-Desc", "\"policy denies\""),
            )
        }

        let client = S3StorageClient::new(&BTreeMap::new());
        client.stores.lock().insert(
            cache_key("s3", "bucket"),
            Arc::new(ObjectStoreFileSystem::with_lister(
                Arc::new(Rejecting),
                "s3",
                "bucket",
                DEFAULT_BLOCK_SIZE,
            )),
        );
        let (status, files) = client.glob_list("s3://bucket/*", false);
        assert_eq!(status.code(), StatusCode::CommonError);
        assert_eq!(status.message(), "Minio request error: \"policy denies\"");
        assert!(files.is_empty());
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut props = BTreeMap::new();
        props.insert("s3.secret_key".to_string(), "hunter2".to_string());
        let client = S3StorageClient::new(&props);
        assert!(!format!("{client:?}").contains("hunter2"));
    }
}
