//! Secret masking for vault properties.
//!
//! [`SecretMasker`] identifies keys that hold secret values (secret keys,
//! session tokens, passwords) and replaces their values with `"***"` when a
//! property map is rendered for logs or `SHOW`/audit output.

use std::collections::BTreeMap;

/// Substring patterns that indicate a key holds a secret value.
///
/// Matched case-insensitively against the full key name.
const SECRET_PATTERNS: &[&str] = &["secret", "password", "token", "credential"];

/// Replacement text for secret values.
pub const MASK: &str = "***";

/// Utility for masking secret values in property maps.
pub struct SecretMasker;

impl SecretMasker {
    /// Returns true if the key name suggests it holds a secret value.
    ///
    /// Access key *ids* (`s3.access_key`, `AWS_ACCESS_KEY`) are not secret.
    ///
    /// # Examples
    ///
    /// ```
    /// use vaultfs_connectors::storage::SecretMasker;
    ///
    /// assert!(SecretMasker::is_secret_key("s3.secret_key"));
    /// assert!(SecretMasker::is_secret_key("AWS_TOKEN"));
    /// assert!(!SecretMasker::is_secret_key("s3.access_key"));
    /// assert!(!SecretMasker::is_secret_key("s3.region"));
    /// ```
    #[must_use]
    pub fn is_secret_key(key: &str) -> bool {
        let lower = key.to_lowercase();
        SECRET_PATTERNS.iter().any(|p| lower.contains(p))
    }

    /// Returns a redacted copy of the map.
    #[must_use]
    pub fn redact_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        map.iter()
            .map(|(k, v)| {
                let value = if Self::is_secret_key(k) {
                    MASK.to_string()
                } else {
                    v.clone()
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// Formats a map as `k=v` pairs, secrets redacted, keys in order.
    #[must_use]
    pub fn display_map(map: &BTreeMap<String, String>) -> String {
        map.iter()
            .map(|(k, v)| {
                if Self::is_secret_key(k) {
                    format!("{k}={MASK}")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
