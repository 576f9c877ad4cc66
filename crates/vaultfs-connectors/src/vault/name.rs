//! Storage vault naming rules.

use crate::error::ConfigError;

/// Maximum length of a vault name.
const MAX_NAME_LEN: usize = 64;

/// Checks a vault name: an ASCII letter followed by up to 63 ASCII letters,
/// digits, `-` or `_`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidName` if the name does not match.
pub fn check_vault_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.len() <= MAX_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidName(name.to_string()))
    }
}
