//! Argo CD Config

use std::time::Duration;

use clap::Args;

use crate::{argocd::ArgoCdClientConfig, session::SessionToken};

/// Argo CD connection settings.
#[derive(Debug, Args)]
pub struct ArgoCdConfig {
    /// Argo CD session token, sent as the `argocd.token` cookie
    #[arg(long, env = "ARGOCD_AUTH_TOKEN", hide_env_values = true)]
    pub argocd_auth_token: SessionToken,

    /// Accept invalid TLS certificates from Argo CD
    #[arg(long, env = "ARGOCD_INSECURE", default_value_t = false)]
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "ARGOCD_REQUEST_TIMEOUT_SECONDS", default_value_t = 30_u64)]
    pub request_timeout_seconds: u64,
}

impl ArgoCdConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Client settings; the session moves into them so no copy outlives the
    /// client.
    #[must_use]
    pub fn into_client_config(self) -> ArgoCdClientConfig {
        let request_timeout = self.request_timeout();

        ArgoCdClientConfig {
            session: self.argocd_auth_token,
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            request_timeout,
        }
    }
}
