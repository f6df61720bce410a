//! Destination store for issued credentials.

use std::{io, path::PathBuf};

use argocd_tokens::intent::CredentialRef;
use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// What a [`CredentialStore::put`] did to the destination container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The container did not exist and was created with the single field.
    Created,

    /// The container existed; only the addressed field was replaced.
    Patched,
}

/// Errors raised by a [`CredentialStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Container names must be plain file-system safe identifiers.
    #[error("invalid container name `{0}`")]
    InvalidContainer(String),

    /// Reading or writing the backing storage failed.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that was accessed.
        path: PathBuf,

        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// A container file holds something other than a string mapping.
    #[error("failed to decode `{path}`: {source}")]
    Decode {
        /// Path that was read.
        path: PathBuf,

        /// Underlying YAML failure.
        #[source]
        source: serde_norway::Error,
    },

    /// A container could not be serialized.
    #[error("failed to encode container: {0}")]
    Encode(#[source] serde_norway::Error),
}

/// Keyed storage the reconciler reads stored credentials from and the
/// control loop writes issued credentials to.
#[automock]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the stored value, `None` when the container or field is absent.
    async fn get(&self, reference: &CredentialRef) -> Result<Option<String>, StoreError>;

    /// Create the container with one field, or patch that field in place.
    async fn put(&self, reference: &CredentialRef, value: &str)
    -> Result<WriteOutcome, StoreError>;
}

/// Reject container names that are empty, hidden or contain anything outside
/// `[A-Za-z0-9._-]`.
pub(crate) fn validate_container(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidContainer(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_names_are_restricted() {
        for name in ["ci-token", "ci_token.v2", "A1"] {
            assert!(validate_container(name).is_ok(), "{name} should be valid");
        }

        for name in ["", ".hidden", "..", "a/b", "../etc", "with space", "ü"] {
            assert!(
                matches!(validate_container(name), Err(StoreError::InvalidContainer(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
