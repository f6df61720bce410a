//! Credential lifecycle reconciliation.
//!
//! One pass looks at a single intent and the credential currently stored for
//! it, then either leaves the credential alone, issues a first one, or revokes
//! an expired one and issues its replacement. Every pass makes at most one
//! project fetch, one revoke and one issue call, and never retries; retry
//! policy belongs to whoever schedules passes.

use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};

use jiff::Timestamp;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    claims::{self, TokenClaims, TokenError},
    intent::{Intent, IntentError},
    remote::{RemoteCredentialClient, RemoteError},
};

/// Issued-at sent when revoking a credential that cannot be decoded.
pub const UNKNOWN_ISSUED_AT: i64 = 0;

/// State of the stored credential at the start of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing is stored yet.
    NoCredential,

    /// A credential is stored and has not expired.
    Valid(TokenClaims),

    /// A credential is stored but has expired.
    Expired(TokenClaims),

    /// A value is stored but cannot be decoded; handled like [`Self::Expired`].
    Undecodable(TokenError),
}

impl CredentialState {
    /// Classify `stored` as of `now`. Blank values count as absent.
    #[must_use]
    pub fn classify(stored: Option<&str>, now: Timestamp) -> Self {
        let Some(token) = stored.filter(|token| !token.trim().is_empty()) else {
            return Self::NoCredential;
        };

        match claims::decode(token) {
            Ok(claims) if claims.is_expired(now) => Self::Expired(claims),
            Ok(claims) => Self::Valid(claims),
            Err(error) => Self::Undecodable(error),
        }
    }
}

/// What a pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The stored credential is still valid and was left untouched.
    Unchanged,

    /// A first credential was issued.
    Created,

    /// An expired credential was revoked and replaced.
    Rotated,
}

/// Result of a successful pass.
#[derive(Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// What the pass did.
    pub action: Action,

    /// Newly issued credential to store, if any.
    pub credential: Option<String>,

    /// When to check again. Never past the expiry of the credential that is
    /// current after this pass; zero means check again as soon as possible.
    pub requeue_after: Duration,
}

impl Debug for ReconcileOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileOutcome")
            .field("action", &self.action)
            .field("credential", &self.credential.as_ref().map(|_| "**redacted**"))
            .field("requeue_after", &self.requeue_after)
            .finish()
    }
}

/// Coarse failure categories a scheduler can base its retry policy on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A token could not be decoded.
    MalformedToken,

    /// Transport failure talking to the remote service.
    Unreachable,

    /// The session credential was rejected.
    Unauthorized,

    /// The declared role does not exist remotely.
    RoleNotFound,

    /// The project does not exist remotely.
    NotFound,

    /// The intent itself cannot be reconciled.
    InvalidIntent,

    /// The remote service answered with something unexpected.
    UnexpectedResponse,
}

impl ErrorKind {
    /// Whether retrying without a change to the intent is pointless.
    #[must_use]
    pub const fn is_configuration_error(self) -> bool {
        matches!(self, Self::RoleNotFound | Self::InvalidIntent)
    }
}

impl From<&RemoteError> for ErrorKind {
    fn from(error: &RemoteError) -> Self {
        match error {
            RemoteError::Unreachable(_) => Self::Unreachable,
            RemoteError::Unauthorized => Self::Unauthorized,
            RemoteError::NotFound(_) => Self::NotFound,
            RemoteError::RoleNotFound { .. } => Self::RoleNotFound,
            RemoteError::InvalidEndpoint { .. } => Self::InvalidIntent,
            RemoteError::UnexpectedResponse(_) => Self::UnexpectedResponse,
        }
    }
}

/// Reasons a pass was aborted. The stored credential is never modified by a
/// failed pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The intent failed validation.
    #[error("invalid intent")]
    InvalidIntent(#[from] IntentError),

    /// The declared role is missing from the fetched project.
    #[error("role `{role}` does not exist in project `{project}`")]
    RoleNotFound {
        /// Project that was fetched.
        project: String,

        /// Role the intent declares.
        role: String,
    },

    /// Fetching the project failed.
    #[error("failed to fetch project")]
    FetchProject(#[source] RemoteError),

    /// Revoking the expired credential failed.
    #[error("failed to revoke expired credential")]
    Revoke(#[source] RemoteError),

    /// Issuing the new credential failed.
    #[error("failed to issue credential")]
    Issue(#[source] RemoteError),

    /// The remote service issued something that is not a decodable token.
    #[error("issued credential could not be decoded")]
    MalformedIssuedToken(#[source] TokenError),
}

impl ReconcileError {
    /// Category of this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIntent(_) => ErrorKind::InvalidIntent,
            Self::RoleNotFound { .. } => ErrorKind::RoleNotFound,
            Self::FetchProject(source) | Self::Revoke(source) | Self::Issue(source) => {
                ErrorKind::from(source)
            }
            Self::MalformedIssuedToken(_) => ErrorKind::MalformedToken,
        }
    }
}

/// Drives one intent's credential through issue, validity and rotation.
#[derive(Clone)]
pub struct LifecycleReconciler {
    client: Arc<dyn RemoteCredentialClient>,
}

impl Debug for LifecycleReconciler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleReconciler").finish_non_exhaustive()
    }
}

impl LifecycleReconciler {
    /// Build a reconciler calling the remote service through `client`.
    #[must_use]
    pub fn new(client: Arc<dyn RemoteCredentialClient>) -> Self {
        Self { client }
    }

    /// Run one pass for `intent` against the `stored` credential as of `now`.
    ///
    /// The requeue delay of a newly issued credential is shortened by the time
    /// the pass itself took, so it never outlasts that credential.
    ///
    /// # Errors
    ///
    /// Returns a [`ReconcileError`] when the intent is invalid, the role is
    /// missing, or a remote call fails. A revoke of a token the remote
    /// service no longer knows is not an error.
    #[instrument(
        skip_all,
        fields(
            pass = %Uuid::now_v7(),
            intent = %intent.name,
            project = %intent.project,
            role = %intent.role,
        )
    )]
    pub async fn reconcile(
        &self,
        intent: &Intent,
        stored: Option<&str>,
        now: Timestamp,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let started = Instant::now();

        intent.validate()?;

        match CredentialState::classify(stored, now) {
            CredentialState::Valid(claims) => {
                warn_on_scope_mismatch(intent, &claims);

                let requeue_after = claims.time_until_expiry(now);

                debug!(
                    expires_at = %claims.expires_at(),
                    "stored credential is valid; requeue in {requeue_after:?}"
                );

                Ok(ReconcileOutcome {
                    action: Action::Unchanged,
                    credential: None,
                    requeue_after,
                })
            }
            CredentialState::NoCredential => {
                info!("no stored credential; issuing");

                self.issue(intent, now, started).await.map(|(credential, requeue_after)| {
                    ReconcileOutcome {
                        action: Action::Created,
                        credential: Some(credential),
                        requeue_after,
                    }
                })
            }
            CredentialState::Expired(claims) => {
                info!(expires_at = %claims.expires_at(), "stored credential expired; rotating");

                self.rotate(intent, claims.issued_at_seconds(), now, started)
                    .await
            }
            CredentialState::Undecodable(error) => {
                warn!("stored credential cannot be decoded ({error}); rotating");

                self.rotate(intent, UNKNOWN_ISSUED_AT, now, started)
                    .await
            }
        }
    }

    async fn rotate(
        &self,
        intent: &Intent,
        issued_at: i64,
        now: Timestamp,
        started: Instant,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.revoke(intent, issued_at).await?;

        let (credential, requeue_after) = self.issue(intent, now, started).await?;

        Ok(ReconcileOutcome {
            action: Action::Rotated,
            credential: Some(credential),
            requeue_after,
        })
    }

    async fn revoke(&self, intent: &Intent, issued_at: i64) -> Result<(), ReconcileError> {
        match self
            .client
            .revoke_credential(&intent.endpoint, &intent.project, &intent.role, issued_at)
            .await
        {
            Ok(()) => {
                info!(issued_at, "revoked expired credential");
                Ok(())
            }
            Err(RemoteError::NotFound(what)) => {
                debug!(issued_at, "{what} already gone; nothing to revoke");
                Ok(())
            }
            Err(source) => Err(ReconcileError::Revoke(source)),
        }
    }

    async fn issue(
        &self,
        intent: &Intent,
        now: Timestamp,
        started: Instant,
    ) -> Result<(String, Duration), ReconcileError> {
        let project = self
            .client
            .fetch_project(&intent.endpoint, &intent.project)
            .await
            .map_err(ReconcileError::FetchProject)?;

        if !project.has_role(&intent.role) {
            warn!("declared role is not defined on the remote project");

            return Err(ReconcileError::RoleNotFound {
                project: intent.project.clone(),
                role: intent.role.clone(),
            });
        }

        let credential = self
            .client
            .issue_credential(
                &intent.endpoint,
                &intent.project,
                &intent.role,
                intent.lifetime_seconds,
            )
            .await
            .map_err(ReconcileError::Issue)?;

        let claims = claims::decode(&credential).map_err(ReconcileError::MalformedIssuedToken)?;
        // `now` predates the remote calls above.
        let requeue_after = claims
            .time_until_expiry(now)
            .saturating_sub(started.elapsed());

        info!(
            issued_at = claims.issued_at_seconds(),
            expires_at = %claims.expires_at(),
            "issued credential; requeue in {requeue_after:?}"
        );

        Ok((credential, requeue_after))
    }
}

fn warn_on_scope_mismatch(intent: &Intent, claims: &TokenClaims) {
    if let Some(scope) = claims.scope()
        && (scope.project != intent.project || scope.role != intent.role)
    {
        warn!(
            token_project = scope.project,
            token_role = scope.role,
            "stored credential was issued for a different scope; it is kept until it expires"
        );
    }
}
