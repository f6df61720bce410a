//! Remote access-control service contract.

use std::error::Error as StdError;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::project::RemoteProject;

/// Failures reported by a [`RemoteCredentialClient`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("remote service unreachable")]
    Unreachable(#[source] Box<dyn StdError + Send + Sync>),

    /// The session credential was rejected.
    #[error("session rejected by remote service")]
    Unauthorized,

    /// The addressed project or token does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The service rejected the role.
    #[error("role `{role}` not found in project `{project}`")]
    RoleNotFound {
        /// Project that was addressed.
        project: String,

        /// Role that was rejected.
        role: String,
    },

    /// The endpoint cannot address the service; retrying will not help.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint {
        /// Endpoint as declared.
        endpoint: String,

        /// Why it was rejected.
        reason: String,
    },

    /// A response that fits none of the above.
    #[error("unexpected response from remote service: {0}")]
    UnexpectedResponse(String),
}

/// Calls the reconciler makes against the remote service.
///
/// The session credential is owned by the implementation and supplied when
/// it is built; it is never read from process-wide state. Transport timeouts
/// are the implementation's concern too.
#[automock]
#[async_trait]
pub trait RemoteCredentialClient: Send + Sync {
    /// Fetch the current configuration of `project`.
    async fn fetch_project(
        &self,
        endpoint: &str,
        project: &str,
    ) -> Result<RemoteProject, RemoteError>;

    /// Issue a new token for `project`/`role` valid for `lifetime_seconds`.
    async fn issue_credential(
        &self,
        endpoint: &str,
        project: &str,
        role: &str,
        lifetime_seconds: i64,
    ) -> Result<String, RemoteError>;

    /// Revoke the token of `project`/`role` issued at `issued_at`.
    ///
    /// A token that no longer exists is reported as [`RemoteError::NotFound`].
    async fn revoke_credential(
        &self,
        endpoint: &str,
        project: &str,
        role: &str,
        issued_at: i64,
    ) -> Result<(), RemoteError>;
}
