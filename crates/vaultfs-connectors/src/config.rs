//! Storage vault configuration types.
//!
//! Provides the validated configuration model consumed by connectors:
//! - [`VaultType`]: Backend tag resolved from the `type` property
//! - [`VaultConfig`]: Immutable, validated vault configuration
//! - [`ConnectorState`]: Lifecycle state of a filesystem connector

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;

/// Property key holding the backend type.
pub const TYPE: &str = "type";

/// Reserved key: object path layout version.
pub const PATH_VERSION: &str = "path_version";

/// Reserved key: number of path shards.
pub const SHARD_NUM: &str = "shard_num";

/// Reserved key: make the vault the default vault.
pub const SET_AS_DEFAULT: &str = "set_as_default";

/// Path-style addressing flag for S3 vaults.
pub const USE_PATH_STYLE: &str = "use_path_style";

/// Immutable property bag shared between a vault and its connectors.
pub type Properties = Arc<BTreeMap<String, String>>;

/// Backend type of a storage vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VaultType {
    /// Amazon S3 or any S3-compatible service (`MinIO`, OSS, COS, ...).
    S3,
    /// Hadoop Distributed File System.
    Hdfs,
    /// Type string did not match a known backend.
    Unknown,
}

impl VaultType {
    /// Resolves a type tag, ignoring case. Unrecognized tags map to `Unknown`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "s3" => VaultType::S3,
            "hdfs" => VaultType::Hdfs,
            _ => VaultType::Unknown,
        }
    }

    /// Returns the canonical tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            VaultType::S3 => "S3",
            VaultType::Hdfs => "HDFS",
            VaultType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for VaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for VaultType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match VaultType::from_tag(s) {
            VaultType::Unknown => Err(ConfigError::UnsupportedVaultType(s.to_string())),
            known => Ok(known),
        }
    }
}

/// A validated storage vault configuration.
///
/// Produced once by [`crate::vault::CreateStorageVault::analyze`] and never
/// mutated afterwards. Reserved keys (`path_version`, `shard_num`,
/// `set_as_default`) have already been lifted out of `properties`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    name: String,
    vault_type: VaultType,
    path_version: i32,
    num_shard: i32,
    set_as_default: bool,
    if_not_exists: bool,
    properties: Properties,
}

impl VaultConfig {
    /// Assembles a config from already-validated parts.
    pub(crate) fn new(
        name: String,
        vault_type: VaultType,
        path_version: i32,
        num_shard: i32,
        set_as_default: bool,
        if_not_exists: bool,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            vault_type,
            path_version,
            num_shard,
            set_as_default,
            if_not_exists,
            properties: Arc::new(properties),
        }
    }

    /// Returns the vault name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend type.
    #[must_use]
    pub fn vault_type(&self) -> VaultType {
        self.vault_type
    }

    /// Returns the object path layout version.
    #[must_use]
    pub fn path_version(&self) -> i32 {
        self.path_version
    }

    /// Returns the number of path shards.
    #[must_use]
    pub fn num_shard(&self) -> i32 {
        self.num_shard
    }

    /// Returns whether the vault should become the default vault.
    #[must_use]
    pub fn set_as_default(&self) -> bool {
        self.set_as_default
    }

    /// Returns whether the declaration used `IF NOT EXISTS`.
    #[must_use]
    pub fn if_not_exists(&self) -> bool {
        self.if_not_exists
    }

    /// Gets a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns the persisted property bag.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Returns a shared handle to the persisted property bag.
    #[must_use]
    pub fn shared_properties(&self) -> Properties {
        Arc::clone(&self.properties)
    }
}

/// Lifecycle state of a filesystem connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    /// No native handle has been built yet (or the last attempt failed).
    Uninitialized,

    /// The native handle is built and published.
    Ready,

    /// The connector has been closed. Terminal.
    Closed,
}

impl ConnectorState {
    pub(crate) const fn as_u8(self) -> u8 {
        match self {
            ConnectorState::Uninitialized => 0,
            ConnectorState::Ready => 1,
            ConnectorState::Closed => 2,
        }
    }

    pub(crate) const fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectorState::Uninitialized,
            1 => ConnectorState::Ready,
            _ => ConnectorState::Closed,
        }
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorState::Uninitialized => write!(f, "Uninitialized"),
            ConnectorState::Ready => write!(f, "Ready"),
            ConnectorState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_type_from_tag() {
        assert_eq!(VaultType::from_tag("S3"), VaultType::S3);
        assert_eq!(VaultType::from_tag("s3"), VaultType::S3);
        assert_eq!(VaultType::from_tag("HDFS"), VaultType::Hdfs);
        assert_eq!(VaultType::from_tag(" hdfs "), VaultType::Hdfs);
        assert_eq!(VaultType::from_tag("ftp"), VaultType::Unknown);
        assert_eq!(VaultType::from_tag(""), VaultType::Unknown);
    }

    #[test]
    fn test_vault_type_from_str_rejects_unknown() {
        assert_eq!("s3".parse::<VaultType>().unwrap(), VaultType::S3);
        let err = "azure".parse::<VaultType>().unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedVaultType("azure".into()));
    }

    #[test]
    fn test_vault_type_display() {
        assert_eq!(VaultType::S3.to_string(), "S3");
        assert_eq!(VaultType::Hdfs.to_string(), "HDFS");
    }

    #[test]
    fn test_vault_config_accessors() {
        let mut props = BTreeMap::new();
        props.insert("type".to_string(), "S3".to_string());
        props.insert("s3.endpoint".to_string(), "http://minio:9000".to_string());

        let cfg = VaultConfig::new("v1".into(), VaultType::S3, 1, 8, true, false, props);
        assert_eq!(cfg.name(), "v1");
        assert_eq!(cfg.vault_type(), VaultType::S3);
        assert_eq!(cfg.path_version(), 1);
        assert_eq!(cfg.num_shard(), 8);
        assert!(cfg.set_as_default());
        assert!(!cfg.if_not_exists());
        assert_eq!(cfg.get("s3.endpoint"), Some("http://minio:9000"));
        assert_eq!(cfg.properties().len(), 2);
    }

    #[test]
    fn test_connector_state_round_trip_through_u8() {
        for state in [
            ConnectorState::Uninitialized,
            ConnectorState::Ready,
            ConnectorState::Closed,
        ] {
            assert_eq!(ConnectorState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_connector_state_display() {
        assert_eq!(ConnectorState::Ready.to_string(), "Ready");
        assert_eq!(ConnectorState::Closed.to_string(), "Closed");
    }
}
