//! Controller configuration module

use clap::Parser;

use crate::config::{
    argocd::ArgoCdConfig, controller::ControllerRuntimeConfig, observability::LoggingConfig,
};

pub mod argocd;
pub mod controller;
pub mod observability;

pub use observability::LogFormat;

/// Argo CD token controller configuration
#[derive(Debug, Parser)]
#[command(
    name = "argocd-tokens-controller",
    about = "Keeps Argo CD project role tokens issued and fresh",
    long_about = None
)]
pub struct Config {
    /// Manifest, store and timing settings.
    #[command(flatten)]
    pub controller: ControllerRuntimeConfig,

    /// Argo CD connection settings.
    #[command(flatten)]
    pub argocd: ArgoCdConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use testresult::TestResult;

    use super::*;

    #[test]
    fn flags_override_defaults() -> TestResult {
        let config = Config::try_parse_from([
            "argocd-tokens-controller",
            "--manifest",
            "/etc/tokens/manifest.yaml",
            "--secrets-dir",
            "/var/lib/tokens",
            "--argocd-auth-token",
            "session",
            "--error-requeue-seconds",
            "15",
            "--log-format",
            "json",
        ])?;

        assert_eq!(config.controller.manifest, Path::new("/etc/tokens/manifest.yaml"));
        assert_eq!(config.controller.secrets_dir, Path::new("/var/lib/tokens"));
        assert_eq!(
            config.controller.settings().error_requeue,
            Duration::from_secs(15)
        );
        assert_eq!(
            config.controller.settings().min_requeue,
            Duration::from_secs(5)
        );
        assert!(!config.argocd.insecure_skip_tls_verify);
        assert_eq!(config.argocd.request_timeout(), Duration::from_secs(30));
        assert!(matches!(config.logging.log_format, LogFormat::Json));

        Ok(())
    }

    #[test]
    fn session_is_redacted_and_moved_into_the_client() -> TestResult {
        let config = Config::try_parse_from([
            "argocd-tokens-controller",
            "--manifest",
            "manifest.yaml",
            "--secrets-dir",
            "secrets",
            "--argocd-auth-token",
            "eyJhbGciOiJIUzI1NiJ9.session",
        ])?;

        let debug = format!("{config:?}");

        assert!(!debug.contains("eyJhbGciOiJIUzI1NiJ9"), "session leaked: {debug}");

        let client = config.argocd.into_client_config();

        assert_eq!(client.session.cookie(), "argocd.token=eyJhbGciOiJIUzI1NiJ9.session");
        assert_eq!(client.request_timeout, Duration::from_secs(30));

        Ok(())
    }
}
