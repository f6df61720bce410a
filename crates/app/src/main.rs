//! Argo CD token controller entry point

use std::{process, sync::Arc};

use argocd_tokens::reconciler::LifecycleReconciler;
use tracing::{error, info};

use argocd_tokens_app::{
    argocd::ArgoCdClient,
    config::Config,
    controller::Controller,
    observability,
    shutdown::StopSignals,
    store::FileCredentialStore,
};

#[tokio::main]
pub async fn main() {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        process::exit(1);
    });

    if let Err(e) = observability::init_subscriber(&config.logging) {
        eprintln!("Logging error: {e}");
        process::exit(1);
    }

    if let Err(message) = run(config).await {
        error!("{message}");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), String> {
    let signals = StopSignals::install().map_err(|error| error.to_string())?;

    let client = ArgoCdClient::new(config.argocd.into_client_config())
        .map_err(|error| format!("failed to build argo cd client: {error}"))?;

    let store = FileCredentialStore::new(&config.controller.secrets_dir);
    let settings = config.controller.settings();

    info!(
        manifest = %config.controller.manifest.display(),
        secrets_dir = %store.dir().display(),
        ?settings,
        "starting controller"
    );

    let controller = Controller::new(
        LifecycleReconciler::new(Arc::new(client)),
        Arc::new(store),
        settings,
    );

    controller
        .run(&config.controller.manifest, async move {
            let signal = signals.recv().await;
            info!(%signal, "stop signal received; draining workers");
        })
        .await
        .map_err(|error| error.to_string())?;

    info!("controller stopped");

    Ok(())
}
