//! Session credential used to authenticate against Argo CD.

use std::fmt;

use zeroize::Zeroize;

/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "argocd.token";

/// Bearer session for the Argo CD API.
///
/// Supplied explicitly when a client is built; never read from process-wide
/// state by the adapter itself.
#[derive(Clone)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// `Cookie` header value for this session.
    #[must_use]
    pub fn cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.value)
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self { value }
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(**redacted**)")?;
        Ok(())
    }
}

impl Drop for SessionToken {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}
