//! Storage property infrastructure shared by all filesystem connectors.
//!
//! # Architecture
//!
//! ```text
//! Vault properties            Environment-style aliases
//! (s3.* / fs.* / hadoop.*)    (AWS_* keys in the same bag)
//!       |                              |
//!       v                              v
//!  PropertyConverter (priority: vault key > alias)
//!       |
//!       v
//!  NativeConf (unset entries dropped)  -->  native filesystem factory
//!
//!  SecretMasker (redacted display for logs and SQL rendering)
//!  StorageScheme / RemoteUri (path parsing)
//! ```

pub mod masking;
pub mod properties;
pub mod scheme;

pub use masking::SecretMasker;
pub use properties::{
    is_role_arn_mode, NativeConf, PropertyConverter, ENV_ROLE_ARN, ROLE_ARN,
};
pub use scheme::{RemoteUri, StorageScheme};
