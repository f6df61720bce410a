//! Declared credential intents.

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

/// Where an issued credential is kept: one field of a named container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialRef {
    /// Container name.
    pub container: String,

    /// Field within the container.
    pub key: String,
}

impl CredentialRef {
    /// Build a reference to `key` inside `container`.
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl Display for CredentialRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// A request for a credential scoped to a remote project and role.
///
/// Owned by whoever declared it; a reconciliation pass only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// Identity of the intent, unique within its source.
    pub name: String,

    /// Base URL of the remote access-control service.
    pub endpoint: String,

    /// Remote project the credential is scoped to.
    pub project: String,

    /// Role within the project.
    pub role: String,

    /// Requested credential lifetime in seconds.
    pub lifetime_seconds: i64,

    /// Destination of the issued credential.
    pub destination: CredentialRef,
}

/// Reasons an intent cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    /// A required field is blank.
    #[error("intent field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// Lifetime is zero or negative.
    #[error("intent lifetime must be positive, got {0}s")]
    NonPositiveLifetime(i64),

    /// Endpoint is not an absolute `http` or `https` URL with a host.
    #[error("intent endpoint `{0}` is not an http(s) URL")]
    InvalidEndpoint(String),
}

impl Intent {
    /// Check the intent can drive an issuance call.
    ///
    /// # Errors
    ///
    /// Returns an [`IntentError`] for a blank field, an endpoint that is not an
    /// `http(s)` URL, or a non-positive lifetime.
    pub fn validate(&self) -> Result<(), IntentError> {
        let fields = [
            ("endpoint", &self.endpoint),
            ("project", &self.project),
            ("role", &self.role),
            ("destination.container", &self.destination.container),
            ("destination.key", &self.destination.key),
        ];

        if let Some((field, _)) = fields.into_iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(IntentError::EmptyField(field));
        }

        if !is_http_url(&self.endpoint) {
            return Err(IntentError::InvalidEndpoint(self.endpoint.clone()));
        }

        if self.lifetime_seconds <= 0 {
            return Err(IntentError::NonPositiveLifetime(self.lifetime_seconds));
        }

        Ok(())
    }
}

fn is_http_url(endpoint: &str) -> bool {
    let Some((scheme, rest)) = endpoint.split_once("://") else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();

    (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
        && !host.is_empty()
        && !endpoint.contains(char::is_whitespace)
}
