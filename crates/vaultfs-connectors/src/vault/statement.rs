//! `CREATE STORAGE VAULT` analysis.
//!
//! [`CreateStorageVault`] is the parsed form of
//! `CREATE STORAGE VAULT [IF NOT EXISTS] <name> PROPERTIES (k = v, ...)`.
//! [`CreateStorageVault::analyze`] validates it and produces the
//! [`VaultConfig`] that connectors are built from.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::config::{
    VaultConfig, VaultType, PATH_VERSION, SET_AS_DEFAULT, SHARD_NUM, TYPE, USE_PATH_STYLE,
};
use crate::error::{ConfigError, VaultError};
use crate::storage::masking::SecretMasker;
use crate::vault::name::check_vault_name;

/// Global privileges checked by vault statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// Cluster administration.
    Admin,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Answers privilege questions for the current session.
pub trait PrivilegeChecker {
    /// Returns true if the session holds the global privilege.
    fn has_global_privilege(&self, privilege: Privilege) -> bool;
}

/// Deployment switches for the vault declaration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Storage vaults only exist in cloud (storage/compute separated) mode.
    pub cloud_mode: bool,
    /// The instance has the storage vault feature enabled.
    pub storage_vault_enabled: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            cloud_mode: true,
            storage_vault_enabled: true,
        }
    }
}

/// A parsed `CREATE STORAGE VAULT` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStorageVault {
    if_not_exists: bool,
    name: String,
    properties: BTreeMap<String, String>,
}

impl CreateStorageVault {
    /// Creates a statement from its parsed parts.
    #[must_use]
    pub fn new(
        if_not_exists: bool,
        name: impl Into<String>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            if_not_exists,
            name: name.into(),
            properties: properties.into_iter().collect(),
        }
    }

    /// Returns the vault name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether `IF NOT EXISTS` was given.
    #[must_use]
    pub fn if_not_exists(&self) -> bool {
        self.if_not_exists
    }

    /// Validates the statement and produces the vault configuration.
    ///
    /// The statement itself is not modified, so analyzing twice yields the
    /// same configuration.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Unsupported` if vaults are unavailable in this deployment
    /// - `VaultError::Authorization` if the session lacks `ADMIN`
    /// - `ConfigError::InvalidName` for a malformed vault name
    /// - `ConfigError::EmptyProperties`, `MissingProperty`, `EmptyProperty`
    ///   for a missing or empty `type`
    /// - `ConfigError::InvalidProperty` for non-numeric reserved keys
    /// - `ConfigError::UnsupportedVaultType` for an unknown `type`
    pub fn analyze(
        &self,
        checker: &dyn PrivilegeChecker,
        options: &ValidatorOptions,
    ) -> Result<VaultConfig, VaultError> {
        if !options.cloud_mode {
            return Err(ConfigError::Unsupported(
                "Storage Vault is only supported for cloud mode".into(),
            )
            .into());
        }
        if !options.storage_vault_enabled {
            return Err(ConfigError::Unsupported(
                "Your cloud instance doesn't support storage vault".into(),
            )
            .into());
        }

        if !checker.has_global_privilege(Privilege::Admin) {
            return Err(VaultError::Authorization(Privilege::Admin.to_string()));
        }

        check_vault_name(&self.name)?;

        if self.properties.is_empty() {
            return Err(ConfigError::EmptyProperties.into());
        }

        let type_tag = self
            .properties
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(TYPE))
            .map(|(_, v)| v.as_str())
            .last()
            .ok_or_else(|| ConfigError::MissingProperty(TYPE.into()))?;
        if type_tag.is_empty() {
            return Err(ConfigError::EmptyProperty(TYPE.into()).into());
        }

        let mut properties = self.properties.clone();
        let path_version = take_int(&mut properties, PATH_VERSION)?.unwrap_or(0);
        let num_shard = take_int(&mut properties, SHARD_NUM)?.unwrap_or(0);
        let set_as_default = properties
            .remove(SET_AS_DEFAULT)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

        let vault_type: VaultType = type_tag.parse()?;

        if vault_type == VaultType::S3 && !properties.contains_key(USE_PATH_STYLE) {
            properties.insert(USE_PATH_STYLE.to_string(), "true".to_string());
        }

        debug!(
            vault = %self.name,
            vault_type = %vault_type,
            path_version,
            num_shard,
            set_as_default,
            "analyzed storage vault"
        );

        Ok(VaultConfig::new(
            self.name.clone(),
            vault_type,
            path_version,
            num_shard,
            set_as_default,
            self.if_not_exists,
            properties,
        ))
    }

    /// Renders the statement as SQL with secret values masked.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let props = SecretMasker::redact_map(&self.properties)
            .iter()
            .map(|(k, v)| format!("\"{k}\" = \"{v}\""))
            .collect::<Vec<_>>()
            .join(",\n");
        let if_not_exists = if self.if_not_exists {
            "IF NOT EXISTS "
        } else {
            ""
        };
        format!(
            "CREATE STORAGE VAULT {if_not_exists}'{}' PROPERTIES({props})",
            self.name
        )
    }
}

/// Removes a reserved integer key from the bag and parses it.
fn take_int(
    properties: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<i32>, ConfigError> {
    match properties.remove(key) {
        Some(v) => v
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidProperty {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{AdminChecker, DeniedChecker};

    fn stmt(pairs: &[(&str, &str)]) -> CreateStorageVault {
        let props = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CreateStorageVault::new(false, "s3_vault", props)
    }

    fn analyze(s: &CreateStorageVault) -> Result<VaultConfig, VaultError> {
        s.analyze(&AdminChecker, &ValidatorOptions::default())
    }

    #[test]
    fn test_s3_path_version_example() {
        let cfg = analyze(&stmt(&[("type", "S3"), ("path_version", "1")])).unwrap();
        assert_eq!(cfg.vault_type(), VaultType::S3);
        assert_eq!(cfg.path_version(), 1);
        assert_eq!(cfg.get(PATH_VERSION), None);
    }

    #[test]
    fn test_s3_injects_path_style() {
        let cfg = analyze(&stmt(&[("type", "s3"), ("s3.endpoint", "http://minio:9000")])).unwrap();
        assert_eq!(cfg.get(USE_PATH_STYLE), Some("true"));
    }

    #[test]
    fn test_s3_keeps_explicit_path_style() {
        let cfg = analyze(&stmt(&[("type", "S3"), ("use_path_style", "false")])).unwrap();
        assert_eq!(cfg.get(USE_PATH_STYLE), Some("false"));
    }

    #[test]
    fn test_hdfs_does_not_get_path_style() {
        let cfg = analyze(&stmt(&[("type", "hdfs"), ("fs.defaultFS", "hdfs://nn:8020")])).unwrap();
        assert_eq!(cfg.vault_type(), VaultType::Hdfs);
        assert_eq!(cfg.get(USE_PATH_STYLE), None);
    }

    #[test]
    fn test_reserved_keys_are_stripped() {
        let cfg = analyze(&stmt(&[
            ("type", "S3"),
            ("path_version", "1"),
            ("shard_num", "16"),
            ("set_as_default", "TRUE"),
        ]))
        .unwrap();
        assert_eq!(cfg.num_shard(), 16);
        assert!(cfg.set_as_default());
        for key in [PATH_VERSION, SHARD_NUM, SET_AS_DEFAULT] {
            assert!(cfg.get(key).is_none(), "{key} should be stripped");
        }
    }

    #[test]
    fn test_defaults_for_absent_reserved_keys() {
        let cfg = analyze(&stmt(&[("type", "S3")])).unwrap();
        assert_eq!(cfg.path_version(), 0);
        assert_eq!(cfg.num_shard(), 0);
        assert!(!cfg.set_as_default());
    }

    #[test]
    fn test_set_as_default_is_lenient() {
        let cfg = analyze(&stmt(&[("type", "S3"), ("set_as_default", "yes")])).unwrap();
        assert!(!cfg.set_as_default());
    }

    #[test]
    fn test_type_key_matched_case_insensitively() {
        let cfg = analyze(&stmt(&[("TYPE", "S3")])).unwrap();
        assert_eq!(cfg.vault_type(), VaultType::S3);
    }

    #[test]
    fn test_empty_properties_rejected() {
        let err = analyze(&stmt(&[])).unwrap_err();
        assert!(matches!(err, VaultError::Config(ConfigError::EmptyProperties)));
    }

    #[test]
    fn test_missing_type_rejected() {
        let err = analyze(&stmt(&[("s3.endpoint", "e")])).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::MissingProperty(ref k)) if k == "type"
        ));
    }

    #[test]
    fn test_empty_type_rejected() {
        let err = analyze(&stmt(&[("type", "")])).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::EmptyProperty(_))
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = analyze(&stmt(&[("type", "ftp")])).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::UnsupportedVaultType(ref t)) if t == "ftp"
        ));
    }

    #[test]
    fn test_non_numeric_path_version_rejected() {
        let err = analyze(&stmt(&[("type", "S3"), ("path_version", "v2")])).unwrap_err();
        assert!(matches!(
            err,
            VaultError::Config(ConfigError::InvalidProperty { ref key, .. }) if key == PATH_VERSION
        ));
    }

    #[test]
    fn test_authorization_checked_before_properties() {
        let err = stmt(&[])
            .analyze(&DeniedChecker, &ValidatorOptions::default())
            .unwrap_err();
        assert!(matches!(err, VaultError::Authorization(ref p) if p == "ADMIN"));
    }

    #[test]
    fn test_feature_gates() {
        let s = stmt(&[("type", "S3")]);
        let err = s
            .analyze(
                &AdminChecker,
                &ValidatorOptions {
                    cloud_mode: false,
                    storage_vault_enabled: true,
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("cloud mode"));

        let err = s
            .analyze(
                &AdminChecker,
                &ValidatorOptions {
                    cloud_mode: true,
                    storage_vault_enabled: false,
                },
            )
            .unwrap_err();
        assert!(err.to_string().contains("doesn't support storage vault"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let s = CreateStorageVault::new(false, "1vault", HashMap::from([("type".into(), "S3".into())]));
        let err = analyze(&s).unwrap_err();
        assert!(matches!(err, VaultError::Config(ConfigError::InvalidName(_))));
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let s = stmt(&[("type", "S3"), ("path_version", "1"), ("set_as_default", "true")]);
        let first = analyze(&s).unwrap();
        let second = analyze(&s).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_to_sql_masks_secrets() {
        let s = CreateStorageVault::new(
            true,
            "s3_vault",
            HashMap::from([
                ("type".to_string(), "S3".to_string()),
                ("s3.secret_key".to_string(), "wJalrXUtnFEMI".to_string()),
            ]),
        );
        let sql = s.to_sql();
        assert!(sql.starts_with("CREATE STORAGE VAULT IF NOT EXISTS 's3_vault' PROPERTIES("));
        assert!(sql.contains("\"type\" = \"S3\""));
        assert!(sql.contains("\"s3.secret_key\" = \"***\""));
        assert!(!sql.contains("wJalrXUtnFEMI"));
    }
}
