//! Authentication contexts for native filesystem construction.
//!
//! An [`AuthenticationContext`] decides under which identity privileged
//! native calls run. S3 has no strong identity protocol on the wire, so S3
//! contexts are always [`AuthMode::Simple`]. Hadoop backends configured for
//! Kerberos run calls through an [`IdentityDelegate`] that assumes the
//! configured principal first.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::VaultType;
use crate::error::FsError;
use crate::storage::properties::{
    NativeConf, HADOOP_KERBEROS_KEYTAB, HADOOP_KERBEROS_PRINCIPAL,
    HADOOP_SECURITY_AUTHENTICATION, HADOOP_USERNAME,
};

/// Credential delegation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Calls run as the process identity (optionally with a remote user name).
    Simple,
    /// Calls run after assuming another identity.
    Impersonated,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Simple => write!(f, "simple"),
            AuthMode::Impersonated => write!(f, "impersonated"),
        }
    }
}

/// An identity to assume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Principal name (e.g. `etl/host@REALM`).
    pub principal: String,
    /// Keytab backing the principal, if any.
    pub keytab: Option<String>,
}

/// Assumes and releases identities around privileged calls.
pub trait IdentityDelegate: Send + Sync + fmt::Debug {
    /// Assumes the identity for the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Authentication` if the identity cannot be assumed.
    fn assume(&self, identity: &Identity) -> Result<(), FsError>;

    /// Releases an identity previously assumed with [`IdentityDelegate::assume`].
    fn release(&self, identity: &Identity);
}

/// Selected credential delegation strategy for one connector.
#[derive(Debug, Clone)]
pub struct AuthenticationContext {
    mode: AuthMode,
    user: Option<String>,
    identity: Option<Identity>,
    delegate: Option<Arc<dyn IdentityDelegate>>,
}

impl AuthenticationContext {
    /// Creates a simple context, optionally carrying a remote user name.
    #[must_use]
    pub fn simple(user: Option<String>) -> Self {
        Self {
            mode: AuthMode::Simple,
            user,
            identity: None,
            delegate: None,
        }
    }

    /// Creates an impersonating context.
    #[must_use]
    pub fn impersonated(identity: Identity, delegate: Arc<dyn IdentityDelegate>) -> Self {
        Self {
            mode: AuthMode::Impersonated,
            user: None,
            identity: Some(identity),
            delegate: Some(delegate),
        }
    }

    /// Selects the context appropriate to a backend and its native config.
    ///
    /// S3 is always simple. Hadoop backends impersonate the configured
    /// principal when `hadoop.security.authentication` is `kerberos`.
    ///
    /// # Errors
    ///
    /// Returns `FsError::Authentication` if Kerberos is requested without a
    /// principal or without an identity delegate.
    pub fn for_backend(
        vault_type: VaultType,
        conf: &NativeConf,
        delegate: Option<&Arc<dyn IdentityDelegate>>,
    ) -> Result<Self, FsError> {
        let kerberos = conf
            .get(HADOOP_SECURITY_AUTHENTICATION)
            .is_some_and(|v| v.eq_ignore_ascii_case("kerberos"));

        if vault_type == VaultType::S3 || !kerberos {
            return Ok(Self::simple(conf.get(HADOOP_USERNAME).map(str::to_string)));
        }

        let principal = conf.get(HADOOP_KERBEROS_PRINCIPAL).ok_or_else(|| {
            FsError::Authentication(format!(
                "kerberos authentication requires '{HADOOP_KERBEROS_PRINCIPAL}'"
            ))
        })?;
        let delegate = delegate.ok_or_else(|| {
            FsError::Authentication("kerberos authentication requires an identity delegate".into())
        })?;

        Ok(Self::impersonated(
            Identity {
                principal: principal.to_string(),
                keytab: conf.get(HADOOP_KERBEROS_KEYTAB).map(str::to_string),
            },
            Arc::clone(delegate),
        ))
    }

    /// Returns the delegation mode.
    #[must_use]
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Returns the remote user of a simple context.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the impersonated identity, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Runs an action under this context.
    ///
    /// Impersonated contexts assume the identity before the action and
    /// release it afterwards, whether or not the action succeeded.
    ///
    /// # Errors
    ///
    /// Returns the identity assumption error, or the action's own error.
    pub fn run_as<T, F>(&self, action: F) -> Result<T, FsError>
    where
        F: FnOnce() -> Result<T, FsError>,
    {
        match (self.mode, &self.identity, &self.delegate) {
            (AuthMode::Impersonated, Some(identity), Some(delegate)) => {
                debug!(principal = %identity.principal, "assuming identity");
                delegate.assume(identity)?;
                let result = action();
                delegate.release(identity);
                result
            }
            _ => action(),
        }
    }
}
