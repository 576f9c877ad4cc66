//! Listing error normalization.
//!
//! [`ErrorNormalizer`] turns a native listing failure into a [`Status`].
//! File-not-found errors become `NOT_FOUND`; everything else becomes
//! `COMMON_ERROR`, with the message taken from the first registered
//! [`ErrorRule`] that recognizes the error, or from the error text.

use std::error::Error as StdError;
use std::fmt;

use crate::error::{FsError, ServiceError};
use crate::fs::Status;

/// MinIO's diagnostic response header.
pub const MINIO_ERROR_DESC_HEADER: &str = "X-Minio-Error-Desc";

/// Extracts a message from a recognized listing error.
pub trait ErrorRule: Send + Sync {
    /// Short rule name for diagnostics.
    fn name(&self) -> &str;

    /// Returns a message if this rule recognizes the error.
    fn extract(&self, err: &(dyn StdError + 'static)) -> Option<String>;
}

/// Iterates over an error and its chain of sources.
fn chain<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

/// Returns the first [`ServiceError`] in an error chain.
#[must_use]
pub fn find_service_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ServiceError> {
    chain(err).find_map(|e| e.downcast_ref::<ServiceError>())
}

/// Surfaces a vendor diagnostic header carried by a storage-service error.
///
/// S3-compatible services that are not AWS often explain failures in a
/// response header rather than in the XML error body.
#[derive(Debug, Clone)]
pub struct VendorHeaderRule {
    name: String,
    header: String,
    prefix: String,
}

impl VendorHeaderRule {
    /// Creates a rule reporting `prefix` followed by the header value.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        header: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            header: header.into(),
            prefix: prefix.into(),
        }
    }

    /// The MinIO `X-Minio-Error-Desc` rule.
    #[must_use]
    pub fn minio() -> Self {
        Self::new("minio", MINIO_ERROR_DESC_HEADER, "Minio request error: ")
    }
}

impl ErrorRule for VendorHeaderRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, err: &(dyn StdError + 'static)) -> Option<String> {
        let service = find_service_error(err)?;
        if service.headers.is_empty() {
            return None;
        }
        service
            .header(&self.header)
            .map(|desc| format!("{}{desc}", self.prefix))
    }
}

/// A rule backed by a closure.
struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> ErrorRule for FnRule<F>
where
    F: Fn(&(dyn StdError + 'static)) -> Option<String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, err: &(dyn StdError + 'static)) -> Option<String> {
        (self.f)(err)
    }
}

/// Ordered chain of [`ErrorRule`]s with a generic fallback.
pub struct ErrorNormalizer {
    rules: Vec<Box<dyn ErrorRule>>,
}

impl ErrorNormalizer {
    /// Creates a normalizer with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Creates a normalizer with the built-in vendor rules.
    #[must_use]
    pub fn new() -> Self {
        Self::empty().with_rule(VendorHeaderRule::minio())
    }

    /// Appends a rule (builder style).
    #[must_use]
    pub fn with_rule(mut self, rule: impl ErrorRule + 'static) -> Self {
        self.register(rule);
        self
    }

    /// Appends a rule. Rules are tried in registration order.
    pub fn register(&mut self, rule: impl ErrorRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Appends a closure rule.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&(dyn StdError + 'static)) -> Option<String> + Send + Sync + 'static,
    {
        self.rules.push(Box::new(FnRule {
            name: name.into(),
            f,
        }));
    }

    /// Returns the rule names in evaluation order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Returns the message of the first rule that recognizes the error.
    #[must_use]
    pub fn vendor_message(&self, err: &FsError) -> Option<String> {
        let as_std: &(dyn StdError + 'static) = err;
        self.rules.iter().find_map(|rule| rule.extract(as_std))
    }

    /// Maps a listing failure to a status.
    #[must_use]
    pub fn normalize(&self, err: &FsError) -> Status {
        if let FsError::NotFound(detail) = err {
            return Status::not_found(format!("file not found: {detail}"));
        }
        self.vendor_message(err).map_or_else(
            || Status::common_error(format!("errors while get file status {err}")),
            Status::common_error,
        )
    }
}

impl Default for ErrorNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorNormalizer")
            .field("rules", &self.rule_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::fs::StatusCode;

    fn minio_error() -> FsError {
        FsError::io_with_source(
            "getFileStatus on s3://bucket/dir: 403 Forbidden",
            ServiceError::new(403, "AccessDenied", "Forbidden")
                .with_header(MINIO_ERROR_DESC_HEADER, "\"Access Denied.\""),
        )
    }

    #[test]
    fn test_service_error_found_through_nested_sources() {
        let err = VaultError::construction(
            crate::config::VaultType::S3,
            FsError::io_with_source(
                "head bucket failed",
                ServiceError::new(503, "SlowDown", "Reduce your request rate"),
            ),
        );
        let found = find_service_error(&err).unwrap();
        assert_eq!(found.code, "SlowDown");
        assert_eq!(chain(&err).count(), 3);

        assert!(find_service_error(&FsError::io("plain")).is_none());
    }

    #[test]
    fn test_not_found() {
        let status = ErrorNormalizer::new().normalize(&FsError::NotFound(
            "s3://bucket/missing".into(),
        ));
        assert_eq!(status.code(), StatusCode::NotFound);
        assert_eq!(status.message(), "file not found: s3://bucket/missing");
    }

    #[test]
    fn test_generic_error_falls_back_to_error_text() {
        let status = ErrorNormalizer::new().normalize(&FsError::io("connection reset"));
        assert_eq!(status.code(), StatusCode::CommonError);
        assert_eq!(status.message(), "errors while get file status connection reset");
    }

    #[test]
    fn test_minio_header_surfaces_as_message() {
        let status = ErrorNormalizer::new().normalize(&minio_error());
        assert_eq!(status.code(), StatusCode::CommonError);
        assert_eq!(status.message(), "Minio request error: \"Access Denied.\"");
    }

    #[test]
    fn test_direct_service_error_is_recognized() {
        let err: FsError = ServiceError::new(500, "InternalError", "oops")
            .with_header("x-minio-error-desc", "disk offline")
            .into();
        let status = ErrorNormalizer::new().normalize(&err);
        assert_eq!(status.message(), "Minio request error: disk offline");
    }

    #[test]
    fn test_service_error_without_vendor_header_falls_back() {
        let err = FsError::io_with_source(
            "list failed",
            ServiceError::new(403, "AccessDenied", "Forbidden")
                .with_header("x-amz-request-id", "ABC"),
        );
        let status = ErrorNormalizer::new().normalize(&err);
        assert_eq!(status.message(), "errors while get file status list failed");
    }

    #[test]
    fn test_empty_normalizer_ignores_headers() {
        let status = ErrorNormalizer::empty().normalize(&minio_error());
        assert!(status.message().starts_with("errors while get file status"));
    }

    #[test]
    fn test_rules_tried_in_order() {
        let mut normalizer = ErrorNormalizer::empty();
        normalizer.register_fn("code", |e| {
            find_service_error(e).map(|s| format!("service code {}", s.code))
        });
        normalizer.register(VendorHeaderRule::minio());

        assert_eq!(normalizer.rule_names(), vec!["code", "minio"]);
        let status = normalizer.normalize(&minio_error());
        assert_eq!(status.message(), "service code AccessDenied");
    }

    #[test]
    fn test_custom_vendor_rule() {
        let normalizer = ErrorNormalizer::new().with_rule(VendorHeaderRule::new(
            "oss",
            "x-oss-ec",
            "OSS request error: ",
        ));
        let err = FsError::io_with_source(
            "list failed",
            ServiceError::new(403, "AccessDenied", "denied").with_header("x-oss-ec", "0003-00000001"),
        );
        assert_eq!(
            normalizer.normalize(&err).message(),
            "OSS request error: 0003-00000001"
        );
    }
}
