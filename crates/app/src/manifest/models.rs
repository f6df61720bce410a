//! On-disk manifest shapes.

use argocd_tokens::intent::{CredentialRef, Intent};
use serde::Deserialize;

/// Top-level manifest document.
#[derive(Debug, Deserialize)]
pub(crate) struct ManifestDocument {
    #[serde(default)]
    pub(crate) tokens: Vec<TokenResource>,
}

/// One declared token.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResource {
    pub(crate) name: String,
    pub(crate) spec: TokenSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenSpec {
    argocd_endpoint: String,
    project: String,
    role: String,
    expires_in: i64,
    secret_ref: SecretRef,
}

#[derive(Debug, Deserialize)]
struct SecretRef {
    name: String,
    key: String,
}

impl From<TokenResource> for Intent {
    fn from(resource: TokenResource) -> Self {
        let TokenResource { name, spec } = resource;

        Self {
            name,
            endpoint: spec.argocd_endpoint,
            project: spec.project,
            role: spec.role,
            lifetime_seconds: spec.expires_in,
            destination: CredentialRef::new(spec.secret_ref.name, spec.secret_ref.key),
        }
    }
}
