//! S3 access through the AWS SDK.
//!
//! [`S3Settings`] reads the `fs.s3a.*` native configuration once, so bad
//! numbers fail at construction time. [`S3Settings::connect`] builds the SDK
//! client: static keys or the default provider chain, optionally wrapped in
//! an STS assume-role provider that presents the vault's external id.
//!
//! Service errors keep their response headers (see [`sdk_error`]) so vendor
//! diagnostics such as MinIO's `X-Minio-Error-Desc` reach the
//! [`ErrorNormalizer`](crate::fs::ErrorNormalizer).
//!
//! Honored native keys: endpoint, region, access/secret key, session token,
//! assumed role ARN and external id, path-style access, connect timeout,
//! request timeout, `fs.s3a.attempts.maximum` and block size.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::sts::AssumeRoleProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{FsError, ServiceError};
use crate::fs::object_store_fs::{ObjectEntry, ObjectLister, ObjectStoreFileSystem, DEFAULT_BLOCK_SIZE};
use crate::fs::{NativeFsFactory, NativeHandle};
use crate::runtime::run_blocking;
use crate::storage::properties::{
    NativeConf, FS_S3A_ACCESS_KEY, FS_S3A_BLOCK_SIZE, FS_S3A_CONNECTION_TIMEOUT,
    FS_S3A_ENDPOINT, FS_S3A_EXTERNAL_ID, FS_S3A_MAX_ATTEMPTS, FS_S3A_PATH_STYLE,
    FS_S3A_REGION, FS_S3A_REQUEST_TIMEOUT, FS_S3A_ROLE_ARN, FS_S3A_SECRET_KEY,
    FS_S3A_SESSION_TOKEN,
};
use crate::storage::scheme::RemoteUri;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// STS session name used when assuming a vault role.
pub const ROLE_SESSION_NAME: &str = "vaultfs-connectors";

const STATIC_PROVIDER_NAME: &str = "vault-properties";

/// A cross-account role to assume before talking to S3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumedRole {
    /// ARN of the role.
    pub role_arn: String,
    /// External id required by the role's trust policy, if any.
    pub external_id: Option<String>,
}

impl AssumedRole {
    /// Reads the role from native configuration. `None` without a role ARN.
    #[must_use]
    pub fn from_conf(conf: &NativeConf) -> Option<Self> {
        let role_arn = conf.get(FS_S3A_ROLE_ARN)?;
        Some(Self {
            role_arn: role_arn.to_string(),
            external_id: conf.get(FS_S3A_EXTERNAL_ID).map(str::to_string),
        })
    }
}

/// Parsed S3 client settings.
#[derive(Clone)]
pub struct S3Settings {
    region: String,
    endpoint: Option<String>,
    path_style: bool,
    credentials: Option<Credentials>,
    role: Option<AssumedRole>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    max_attempts: Option<u32>,
    block_size: i64,
}

impl S3Settings {
    /// Reads settings from native configuration.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Io` if a numeric setting cannot be parsed.
    pub fn from_conf(conf: &NativeConf) -> Result<Self, FsError> {
        let credentials = match (conf.get(FS_S3A_ACCESS_KEY), conf.get(FS_S3A_SECRET_KEY)) {
            (Some(ak), Some(sk)) => Some(Credentials::new(
                ak,
                sk,
                conf.get(FS_S3A_SESSION_TOKEN).map(str::to_string),
                None,
                STATIC_PROVIDER_NAME,
            )),
            _ => None,
        };
        Ok(Self {
            region: conf.get(FS_S3A_REGION).unwrap_or(DEFAULT_REGION).to_string(),
            endpoint: conf.get(FS_S3A_ENDPOINT).map(str::to_string),
            path_style: conf.get_bool(FS_S3A_PATH_STYLE, false),
            credentials,
            role: AssumedRole::from_conf(conf),
            connect_timeout: conf
                .get_parsed::<u64>(FS_S3A_CONNECTION_TIMEOUT)?
                .map(Duration::from_millis),
            request_timeout: conf
                .get_parsed::<u64>(FS_S3A_REQUEST_TIMEOUT)?
                .map(Duration::from_millis),
            max_attempts: conf.get_parsed::<u32>(FS_S3A_MAX_ATTEMPTS)?,
            block_size: conf
                .get_parsed::<i64>(FS_S3A_BLOCK_SIZE)?
                .unwrap_or(DEFAULT_BLOCK_SIZE),
        })
    }

    /// Returns the role assumed for every request, if any.
    #[must_use]
    pub fn role(&self) -> Option<&AssumedRole> {
        self.role.as_ref()
    }

    /// Returns the configured endpoint, if any.
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Returns true for path-style addressing.
    #[must_use]
    pub fn path_style(&self) -> bool {
        self.path_style
    }

    /// Returns true if static keys were configured.
    #[must_use]
    pub fn has_static_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Returns the block size reported for listed objects.
    #[must_use]
    pub fn block_size(&self) -> i64 {
        self.block_size
    }

    /// Builds an SDK client.
    ///
    /// Without static keys the default provider chain (environment, profile,
    /// instance metadata) supplies the base identity. With a role, that
    /// identity is exchanged through STS for the role's credentials.
    pub async fn connect(&self) -> Client {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));
        if let Some(credentials) = &self.credentials {
            loader = loader.credentials_provider(credentials.clone());
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(self.path_style);
        if let Some(endpoint) = &self.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if self.connect_timeout.is_some() || self.request_timeout.is_some() {
            let mut timeouts = TimeoutConfig::builder();
            timeouts.set_connect_timeout(self.connect_timeout);
            timeouts.set_operation_attempt_timeout(self.request_timeout);
            builder = builder.timeout_config(timeouts.build());
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.retry_config(RetryConfig::standard().with_max_attempts(attempts.max(1)));
        }
        if let Some(role) = &self.role {
            let mut assume = AssumeRoleProvider::builder(role.role_arn.clone())
                .session_name(ROLE_SESSION_NAME)
                .configure(&shared);
            if let Some(external_id) = &role.external_id {
                assume = assume.external_id(external_id.clone());
            }
            builder = builder.credentials_provider(assume.build().await);
            info!(role_arn = %role.role_arn, "assuming role for S3 access");
        }
        Client::from_conf(builder.build())
    }
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("static_credentials", &self.credentials.is_some())
            .field("role", &self.role)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

/// Maps an SDK failure to [`FsError`], keeping the service response.
///
/// A `404` becomes `FsError::NotFound`. Any other response becomes a
/// [`ServiceError`] carrying the status, vendor code and message, and every
/// response header. Failures without a response (connect errors, timeouts)
/// become `FsError::Io`.
pub fn sdk_error<E>(context: &str, err: SdkError<E>) -> FsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = err.raw_response() {
        let status = raw.status().as_u16();
        if status == 404 {
            return FsError::NotFound(context.to_string());
        }
        let mut service = ServiceError::new(
            status,
            err.code().unwrap_or_default(),
            err.message().unwrap_or_default(),
        );
        for (name, value) in raw.headers().iter() {
            service = service.with_header(name, value);
        }
        return FsError::io_with_source(format!("{context}: {service}"), service);
    }
    let message = match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => format!(
            "{context}: failed to reach storage service: {}",
            DisplayErrorContext(&err)
        ),
        _ => format!("{context}: {}", DisplayErrorContext(&err)),
    };
    FsError::io_with_source(message, err)
}

/// [`ObjectLister`] for one S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Lister {
    client: Client,
    bucket: String,
}

impl S3Lister {
    /// Lists `bucket` through `client`.
    #[must_use]
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectLister for S3Lister {
    async fn head(&self, key: &str) -> Result<Option<ObjectEntry>, FsError> {
        let context = format!("getFileStatus on s3://{}/{key}", self.bucket);
        match self.client.head_object().bucket(&self.bucket).key(key).send().await {
            Ok(out) => Ok(Some(ObjectEntry {
                key: key.to_string(),
                size: out.content_length().unwrap_or(0),
                last_modified: out.last_modified().and_then(|t| t.to_millis().ok()).unwrap_or(0),
            })),
            Err(e) => match sdk_error(&context, e) {
                FsError::NotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, FsError> {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        let context = format!("listStatus on s3://{}/{prefix}", self.bucket);

        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| sdk_error(&context, e))?;
            for object in out.contents() {
                let Some(key) = object.key() else { continue };
                entries.push(ObjectEntry {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| t.to_millis().ok())
                        .unwrap_or(0),
                });
            }
            match out.next_continuation_token() {
                Some(next) if out.is_truncated() == Some(true) => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(entries)
    }
}

/// Builds S3 native handles from `fs.s3a.*` configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3NativeFsFactory;

impl S3NativeFsFactory {
    /// Builds an S3 handle for the bucket of `uri`.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Io` if the path has no bucket or the storage
    /// runtime cannot be started.
    pub fn handle(uri: &str, settings: &S3Settings) -> Result<Arc<ObjectStoreFileSystem>, FsError> {
        let remote = RemoteUri::parse(uri)?;
        let client = run_blocking(|| async { Ok(settings.connect().await) })?;
        debug!(
            bucket = remote.authority(),
            endpoint = settings.endpoint(),
            path_style = settings.path_style(),
            "S3 client built"
        );
        Ok(Arc::new(ObjectStoreFileSystem::with_lister(
            Arc::new(S3Lister::new(client, remote.authority())),
            remote.scheme(),
            remote.authority(),
            settings.block_size(),
        )))
    }
}

impl NativeFsFactory for S3NativeFsFactory {
    fn create(&self, uri: &str, conf: &NativeConf) -> Result<NativeHandle, FsError> {
        let settings = S3Settings::from_conf(conf)?;
        let handle: NativeHandle = Self::handle(uri, &settings)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
    use aws_smithy_runtime_api::http::{Response, StatusCode};
    use aws_smithy_types::body::SdkBody;

    use super::*;
    use crate::fs::normalizer::ErrorNormalizer;
    use crate::fs::NativeFileSystem;

    fn minio_conf(endpoint: &str) -> NativeConf {
        let mut conf = NativeConf::new();
        conf.set(FS_S3A_ENDPOINT, endpoint);
        conf.set(FS_S3A_ACCESS_KEY, "minio");
        conf.set(FS_S3A_SECRET_KEY, "minio123");
        conf.set(FS_S3A_PATH_STYLE, "true");
        conf.set(FS_S3A_MAX_ATTEMPTS, "1");
        conf.set(FS_S3A_CONNECTION_TIMEOUT, "2000");
        conf
    }

    fn service_failure(status: u16, headers: &[(&'static str, &'static str)]) -> SdkError<ListObjectsV2Error> {
        let mut raw = Response::new(StatusCode::try_from(status).unwrap(), SdkBody::empty());
        for (name, value) in headers {
            raw.headers_mut().insert(*name, *value);
        }
        let meta = ErrorMetadata::builder()
            .code("AccessDenied")
            .message("Access Denied.")
            .build();
        SdkError::service_error(ListObjectsV2Error::generic(meta), raw)
    }

    #[test]
    fn test_settings_from_conf() {
        let mut conf = minio_conf("http://127.0.0.1:9000");
        conf.set(FS_S3A_BLOCK_SIZE, "1048576");
        conf.set(FS_S3A_REQUEST_TIMEOUT, "3000");
        let settings = S3Settings::from_conf(&conf).unwrap();
        assert_eq!(settings.endpoint(), Some("http://127.0.0.1:9000"));
        assert!(settings.path_style());
        assert!(settings.has_static_credentials());
        assert_eq!(settings.block_size(), 1_048_576);
        assert!(settings.role().is_none());
        assert!(!format!("{settings:?}").contains("minio123"));
    }

    #[test]
    fn test_settings_read_assumed_role() {
        let mut conf = NativeConf::new();
        conf.set(FS_S3A_ROLE_ARN, "arn:aws:iam::123456789012:role/lake-reader");
        conf.set(FS_S3A_EXTERNAL_ID, "tenant-7");
        let settings = S3Settings::from_conf(&conf).unwrap();
        assert_eq!(
            settings.role(),
            Some(&AssumedRole {
                role_arn: "arn:aws:iam::123456789012:role/lake-reader".into(),
                external_id: Some("tenant-7".into()),
            })
        );
        assert!(!settings.has_static_credentials());
    }

    #[test]
    fn test_factory_rejects_bad_numbers() {
        let mut conf = NativeConf::new();
        conf.set(FS_S3A_BLOCK_SIZE, "big");
        let err = S3NativeFsFactory.create("s3://warehouse/tables", &conf).unwrap_err();
        assert!(err.to_string().contains(FS_S3A_BLOCK_SIZE));

        let mut conf = NativeConf::new();
        conf.set(FS_S3A_REQUEST_TIMEOUT, "soon");
        assert!(S3NativeFsFactory.create("s3://warehouse/t", &conf).is_err());
    }

    #[test]
    fn test_factory_requires_bucket() {
        assert!(S3NativeFsFactory
            .create("s3:///key", &minio_conf("http://127.0.0.1:9000"))
            .is_err());
    }

    #[test]
    fn test_plain_http_endpoint_is_dialed() {
        let handle = S3NativeFsFactory
            .create("s3://warehouse/data", &minio_conf("http://127.0.0.1:1"))
            .unwrap();
        let err = handle.glob_status("s3://warehouse/data/*").unwrap_err();
        assert!(
            err.to_string().contains("failed to reach storage service"),
            "{err}"
        );
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_plain_http_endpoint_inside_current_thread_runtime() {
        let handle = S3NativeFsFactory
            .create("s3://warehouse/data", &minio_conf("http://127.0.0.1:1"))
            .unwrap();
        let err = handle.glob_status("s3://warehouse/data").unwrap_err();
        assert!(err.to_string().contains("failed to reach storage service"));
    }

    #[test]
    fn test_service_error_keeps_response_headers() {
        let err = sdk_error(
            "listStatus on s3://warehouse/data/",
            service_failure(403, &[("x-minio-error-desc", "\"bucket policy denies\"")]),
        );
        let service = crate::fs::normalizer::find_service_error(&err).unwrap();
        assert_eq!(service.status, 403);
        assert_eq!(service.code, "AccessDenied");
        assert_eq!(service.header("X-Minio-Error-Desc"), Some("\"bucket policy denies\""));

        let status = ErrorNormalizer::new().normalize(&err);
        assert_eq!(status.message(), "Minio request error: \"bucket policy denies\"");
    }

    #[test]
    fn test_service_error_without_vendor_header() {
        let err = sdk_error("listStatus on s3://warehouse/", service_failure(403, &[]));
        assert!(err.to_string().contains("Access Denied. (Status Code: 403; Error Code: AccessDenied)"));
        let status = ErrorNormalizer::new().normalize(&err);
        assert!(status.message().starts_with("errors while get file status listStatus"));
    }

    #[test]
    fn test_missing_response_is_not_found() {
        let err = sdk_error("getFileStatus on s3://warehouse/gone", service_failure(404, &[]));
        assert!(matches!(err, FsError::NotFound(ref p) if p == "getFileStatus on s3://warehouse/gone"));
    }
}
