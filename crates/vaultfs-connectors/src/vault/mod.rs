//! Storage vault declarations.
//!
//! Validates `CREATE STORAGE VAULT` statements into [`crate::config::VaultConfig`]:
//! privilege and feature checks, name rules, reserved-key extraction and
//! backend defaults.

pub mod name;
pub mod statement;

pub use name::check_vault_name;
pub use statement::{CreateStorageVault, Privilege, PrivilegeChecker, ValidatorOptions};
