//! Controller Config

use std::{path::PathBuf, time::Duration};

use clap::Args;

use crate::controller::ControllerSettings;

/// Manifest, credential store and timing settings.
#[derive(Debug, Args)]
pub struct ControllerRuntimeConfig {
    /// Path to the token manifest YAML
    #[arg(long, env = "TOKENS_MANIFEST")]
    pub manifest: PathBuf,

    /// Directory issued credentials are written to
    #[arg(long, env = "TOKENS_SECRETS_DIR")]
    pub secrets_dir: PathBuf,

    /// Requeue delay when a pass asks to run again immediately
    #[arg(long, env = "TOKENS_MIN_REQUEUE_SECONDS", default_value_t = 5_u64)]
    pub min_requeue_seconds: u64,

    /// Requeue delay after a transient failure
    #[arg(long, env = "TOKENS_ERROR_REQUEUE_SECONDS", default_value_t = 60_u64)]
    pub error_requeue_seconds: u64,

    /// How often the manifest is re-read
    #[arg(long, env = "TOKENS_MANIFEST_POLL_SECONDS", default_value_t = 30_u64)]
    pub manifest_poll_seconds: u64,
}

impl ControllerRuntimeConfig {
    #[must_use]
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            min_requeue: Duration::from_secs(self.min_requeue_seconds.max(1)),
            error_requeue: Duration::from_secs(self.error_requeue_seconds.max(1)),
            manifest_poll: Duration::from_secs(self.manifest_poll_seconds.max(1)),
        }
    }
}
