//! Vault property conversion.
//!
//! [`PropertyConverter`] turns a validated vault property bag into the
//! key space understood by the native filesystem client ([`NativeConf`]).
//! Every S3 option can be supplied under two names: the vault key
//! (`s3.access_key`) or an environment-style alias (`AWS_ACCESS_KEY`).
//!
//! Resolution priority:
//! 1. Vault key
//! 2. Environment-style alias key in the same property bag
//! 3. Unset (dropped from the native configuration)

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::{VaultType, TYPE, USE_PATH_STYLE};
use crate::error::FsError;
use crate::storage::masking::SecretMasker;

/// Vault key carrying the cross-account role to assume.
pub const ROLE_ARN: &str = "s3.role_arn";

/// Environment-style alias of [`ROLE_ARN`].
pub const ENV_ROLE_ARN: &str = "AWS_ROLE_ARN";

/// Native key: S3 endpoint.
pub const FS_S3A_ENDPOINT: &str = "fs.s3a.endpoint";
/// Native key: S3 signing region.
pub const FS_S3A_REGION: &str = "fs.s3a.endpoint.region";
/// Native key: access key id.
pub const FS_S3A_ACCESS_KEY: &str = "fs.s3a.access.key";
/// Native key: secret access key.
pub const FS_S3A_SECRET_KEY: &str = "fs.s3a.secret.key";
/// Native key: session token for temporary credentials.
pub const FS_S3A_SESSION_TOKEN: &str = "fs.s3a.session.token";
/// Native key: role to assume.
pub const FS_S3A_ROLE_ARN: &str = "fs.s3a.assumed.role.arn";
/// Native key: external id presented when assuming a role.
pub const FS_S3A_EXTERNAL_ID: &str = "fs.s3a.assumed.role.external.id";
/// Native key: attempts per request, including the first.
pub const FS_S3A_MAX_ATTEMPTS: &str = "fs.s3a.attempts.maximum";
/// Native key: request timeout in milliseconds.
pub const FS_S3A_REQUEST_TIMEOUT: &str = "fs.s3a.connection.request.timeout";
/// Native key: connect timeout in milliseconds.
pub const FS_S3A_CONNECTION_TIMEOUT: &str = "fs.s3a.connection.timeout";
/// Native key: path-style addressing.
pub const FS_S3A_PATH_STYLE: &str = "fs.s3a.path.style.access";
/// Native key: reported block size of listed objects.
pub const FS_S3A_BLOCK_SIZE: &str = "fs.s3a.block.size";

/// Native key: Hadoop authentication method (`simple` or `kerberos`).
pub const HADOOP_SECURITY_AUTHENTICATION: &str = "hadoop.security.authentication";
/// Native key: Kerberos principal to impersonate.
pub const HADOOP_KERBEROS_PRINCIPAL: &str = "hadoop.kerberos.principal";
/// Native key: Kerberos keytab path.
pub const HADOOP_KERBEROS_KEYTAB: &str = "hadoop.kerberos.keytab";
/// Native key: remote user for simple authentication.
pub const HADOOP_USERNAME: &str = "hadoop.username";

/// S3 option mapping: (native key, vault key, environment-style alias).
const S3_KEY_MAPPING: &[(&str, &str, &str)] = &[
    (FS_S3A_ENDPOINT, "s3.endpoint", "AWS_ENDPOINT"),
    (FS_S3A_REGION, "s3.region", "AWS_REGION"),
    (FS_S3A_ACCESS_KEY, "s3.access_key", "AWS_ACCESS_KEY"),
    (FS_S3A_SECRET_KEY, "s3.secret_key", "AWS_SECRET_KEY"),
    (FS_S3A_SESSION_TOKEN, "s3.session_token", "AWS_TOKEN"),
    (FS_S3A_ROLE_ARN, ROLE_ARN, ENV_ROLE_ARN),
    (FS_S3A_EXTERNAL_ID, "s3.external_id", "AWS_EXTERNAL_ID"),
    (
        FS_S3A_REQUEST_TIMEOUT,
        "s3.connection.request.timeout",
        "AWS_REQUEST_TIMEOUT_MS",
    ),
    (
        FS_S3A_CONNECTION_TIMEOUT,
        "s3.connection.timeout",
        "AWS_CONNECTION_TIMEOUT_MS",
    ),
    (FS_S3A_PATH_STYLE, USE_PATH_STYLE, "AWS_PATH_STYLE"),
];

/// Key prefixes that are already in native form and pass through untouched.
const NATIVE_PREFIXES: &[&str] = &["fs.", "hadoop.", "dfs.", "ipc.", "yarn."];

/// Returns true if the property bag asks for cross-account role assumption.
///
/// Checks both [`ROLE_ARN`] and its alias [`ENV_ROLE_ARN`]; empty values do
/// not count.
#[must_use]
pub fn is_role_arn_mode(properties: &BTreeMap<String, String>) -> bool {
    [ROLE_ARN, ENV_ROLE_ARN]
        .iter()
        .any(|k| properties.get(*k).is_some_and(|v| !v.is_empty()))
}

/// Looks up a vault key, falling back to its alias. Empty values are unset.
fn lookup<'a>(
    properties: &'a BTreeMap<String, String>,
    key: &str,
    alias: &str,
) -> Option<&'a str> {
    [key, alias]
        .iter()
        .filter_map(|k| properties.get(*k))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

/// Converts vault properties into native filesystem configuration.
pub struct PropertyConverter;

impl PropertyConverter {
    /// Produces native configuration entries for a backend.
    ///
    /// Entries whose value is unset are reported as `None`; they are dropped
    /// by [`NativeConf::from_entries`].
    #[must_use]
    pub fn native_entries(
        vault_type: VaultType,
        properties: &BTreeMap<String, String>,
    ) -> Vec<(String, Option<String>)> {
        let mut entries: Vec<(String, Option<String>)> = Vec::new();

        if vault_type == VaultType::S3 {
            for (native, key, alias) in S3_KEY_MAPPING {
                entries.push((
                    (*native).to_string(),
                    lookup(properties, key, alias).map(str::to_string),
                ));
            }
        }

        for (k, v) in properties {
            if k.eq_ignore_ascii_case(TYPE) {
                continue;
            }
            let passthrough = vault_type == VaultType::Hdfs
                || NATIVE_PREFIXES.iter().any(|p| k.starts_with(p));
            if passthrough {
                let value = (!v.is_empty()).then(|| v.clone());
                entries.push((k.clone(), value));
            }
        }

        entries
    }

    /// Builds the native configuration for a backend.
    #[must_use]
    pub fn to_native_conf(
        vault_type: VaultType,
        properties: &BTreeMap<String, String>,
    ) -> NativeConf {
        NativeConf::from_entries(Self::native_entries(vault_type, properties))
    }
}

/// Configuration handed to a native filesystem factory.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct NativeConf {
    entries: BTreeMap<String, String>,
}

impl NativeConf {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration, skipping entries with an empty key or unset value.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<String>)>,
    {
        let entries = entries
            .into_iter()
            .filter(|(k, _)| !k.is_empty())
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        Self { entries }
    }

    /// Sets a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Gets a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Gets a value parsed as the given type.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Io` if the value cannot be parsed.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>, FsError>
    where
        T::Err: fmt::Display,
    {
        match self.get(key) {
            Some(v) => v
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| FsError::io(format!("invalid value for '{key}': {e}"))),
            None => Ok(None),
        }
    }

    /// Gets a boolean value (`true`, case-insensitive), with a default.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for NativeConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeConf")
            .field("entries", &SecretMasker::display_map(&self.entries))
            .finish()
    }
}
