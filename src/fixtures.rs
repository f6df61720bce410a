//! Fixtures
//!
//! Unsigned tokens with chosen claims, shaped like the ones the remote
//! service issues. Only the claims are meaningful; the signature is filler.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};

const FIXTURE_SIGNATURE: &str = "Zml4dHVyZS1zaWduYXR1cmU";

/// Encode `claims` as the payload of a compact token.
#[must_use]
pub fn token_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

    format!("{header}.{payload}.{FIXTURE_SIGNATURE}")
}

/// A token with only `iat` and `exp` set.
#[must_use]
pub fn token_expiring_at(issued_at: i64, expires_at: i64) -> String {
    token_with_claims(&json!({ "iat": issued_at, "exp": expires_at }))
}

/// A token scoped to `project`/`role` the way the remote service scopes them.
#[must_use]
pub fn scoped_token(project: &str, role: &str, issued_at: i64, expires_at: i64) -> String {
    token_with_claims(&json!({
        "iat": issued_at,
        "exp": expires_at,
        "nbf": issued_at,
        "iss": "argocd",
        "sub": format!("proj:{project}:{role}"),
    }))
}
