//! Native filesystem factory registry.
//!
//! The [`FsFactoryRegistry`] maps each backend type to the factory that
//! builds its native handles. S3 is served by `object_store` out of the box;
//! Hadoop backends need a caller-supplied factory.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::VaultType;
use crate::error::FsError;
use crate::fs::s3::S3NativeFsFactory;
use crate::fs::{NativeFsFactory, NativeHandle};
use crate::storage::properties::NativeConf;

/// Registry of native filesystem factories keyed by backend.
///
/// # Example
///
/// ```rust,ignore
/// let registry = FsFactoryRegistry::with_defaults();
/// registry.register(VaultType::Hdfs, Arc::new(MyHdfsFactory::new()));
///
/// let factory = registry.factory(VaultType::Hdfs);
/// ```
#[derive(Clone)]
pub struct FsFactoryRegistry {
    factories: Arc<RwLock<HashMap<VaultType, Arc<dyn NativeFsFactory>>>>,
}

impl FsFactoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a registry with the built-in S3 factory.
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(VaultType::S3, Arc::new(S3NativeFsFactory));
        registry
    }

    /// Registers (or replaces) the factory for a backend.
    pub fn register(&self, vault_type: VaultType, factory: Arc<dyn NativeFsFactory>) {
        self.factories.write().insert(vault_type, factory);
    }

    /// Returns true if a factory is registered for the backend.
    #[must_use]
    pub fn contains(&self, vault_type: VaultType) -> bool {
        self.factories.read().contains_key(&vault_type)
    }

    /// Returns the factory for a backend.
    ///
    /// An unregistered backend gets a factory that always fails, so the
    /// failure surfaces as a construction error on first use.
    #[must_use]
    pub fn factory(&self, vault_type: VaultType) -> Arc<dyn NativeFsFactory> {
        self.factories
            .read()
            .get(&vault_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(MissingFactory { vault_type }))
    }

    /// Lists registered backends.
    #[must_use]
    pub fn registered(&self) -> Vec<VaultType> {
        let mut types: Vec<VaultType> = self.factories.read().keys().copied().collect();
        types.sort();
        types
    }
}

impl Default for FsFactoryRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for FsFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsFactoryRegistry")
            .field("registered", &self.registered())
            .finish()
    }
}

#[derive(Debug)]
struct MissingFactory {
    vault_type: VaultType,
}

impl NativeFsFactory for MissingFactory {
    fn create(&self, uri: &str, _conf: &NativeConf) -> Result<NativeHandle, FsError> {
        Err(FsError::Unsupported(format!(
            "no native filesystem registered for {} ({uri})",
            self.vault_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFsFactory;

    #[test]
    fn test_defaults_serve_s3_only() {
        let registry = FsFactoryRegistry::with_defaults();
        assert!(registry.contains(VaultType::S3));
        assert!(!registry.contains(VaultType::Hdfs));
        assert_eq!(registry.registered(), vec![VaultType::S3]);
    }

    #[test]
    fn test_missing_factory_fails_on_create() {
        let registry = FsFactoryRegistry::new();
        let err = registry
            .factory(VaultType::Hdfs)
            .create("hdfs://nn:8020/x", &NativeConf::new())
            .unwrap_err();
        assert!(matches!(err, FsError::Unsupported(_)));
        assert!(err.to_string().contains("HDFS"));
    }

    #[test]
    fn test_register_replaces() {
        let registry = FsFactoryRegistry::with_defaults();
        let mock = Arc::new(MockFsFactory::new());
        registry.register(VaultType::S3, mock.clone());

        registry
            .factory(VaultType::S3)
            .create("s3://b/k", &NativeConf::new())
            .unwrap();
        assert_eq!(mock.create_count(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = FsFactoryRegistry::new();
        let clone = registry.clone();
        clone.register(VaultType::Hdfs, Arc::new(MockFsFactory::new()));
        assert!(registry.contains(VaultType::Hdfs));
    }
}
