//! Control loop: one worker per declared intent, fed from the manifest.

use std::{
    fmt,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use argocd_tokens::{intent::Intent, reconciler::LifecycleReconciler};
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{Instrument, info, info_span, warn};

use crate::{
    manifest::{Manifest, ManifestDiff, ManifestError},
    store::CredentialStore,
};

mod worker;

pub use worker::NextPass;

/// Timing knobs for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Delay used when a pass asks to run again immediately.
    pub min_requeue: Duration,

    /// Fixed delay after a transient failure.
    pub error_requeue: Duration,

    /// How often the manifest is re-read.
    pub manifest_poll: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            min_requeue: Duration::from_secs(5),
            error_requeue: Duration::from_secs(60),
            manifest_poll: Duration::from_secs(30),
        }
    }
}

/// Errors that stop the control loop.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The manifest could not be loaded at startup.
    #[error("failed to load manifest `{path}`: {source}")]
    Manifest {
        /// Manifest location.
        path: PathBuf,

        /// Underlying failure.
        #[source]
        source: ManifestError,
    },
}

/// Keeps every declared credential fresh.
#[derive(Clone)]
pub struct Controller {
    reconciler: LifecycleReconciler,
    store: Arc<dyn CredentialStore>,
    settings: ControllerSettings,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("reconciler", &self.reconciler)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

struct Worker {
    intents: watch::Sender<Intent>,
    handle: JoinHandle<()>,
}

impl Controller {
    #[must_use]
    pub fn new(
        reconciler: LifecycleReconciler,
        store: Arc<dyn CredentialStore>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            reconciler,
            store,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Run until `shutdown` resolves.
    ///
    /// The manifest at `manifest_path` is re-read every
    /// [`ControllerSettings::manifest_poll`]; a failed re-read keeps the
    /// previous intent set.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be loaded at startup.
    pub async fn run<F>(self, manifest_path: &Path, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut manifest =
            Manifest::load(manifest_path)
                .await
                .map_err(|source| ControllerError::Manifest {
                    path: manifest_path.to_path_buf(),
                    source,
                })?;

        info!(intents = manifest.len(), path = %manifest_path.display(), "manifest loaded");

        let (stop, stopped) = watch::channel(false);
        let mut workers = FxHashMap::default();

        self.apply(
            &mut workers,
            &stopped,
            Manifest::default().diff(&manifest),
        );

        let mut poll = time::interval(self.settings.manifest_poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        poll.tick().await;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = poll.tick() => match Manifest::load(manifest_path).await {
                    Ok(next) => {
                        let diff = manifest.diff(&next);

                        if !diff.is_empty() {
                            info!(
                                created = diff.created.len(),
                                updated = diff.updated.len(),
                                deleted = diff.deleted.len(),
                                "manifest changed"
                            );
                            self.apply(&mut workers, &stopped, diff);
                        }

                        manifest = next;
                    }
                    Err(error) => {
                        warn!(%error, "failed to reload manifest, keeping previous intents");
                    }
                },
            }
        }

        info!(workers = workers.len(), "stopping workers");

        _ = stop.send(true);

        for (name, worker) in workers {
            drop(worker.intents);

            if let Err(error) = worker.handle.await {
                warn!(intent = %name, %error, "worker did not stop cleanly");
            }
        }

        Ok(())
    }

    fn apply(
        &self,
        workers: &mut FxHashMap<String, Worker>,
        stopped: &watch::Receiver<bool>,
        diff: ManifestDiff,
    ) {
        for name in diff.deleted {
            if workers.remove(&name).is_some() {
                info!(intent = %name, "intent removed, stored credential left in place");
            }
        }

        for intent in diff.updated {
            match workers.get(&intent.name) {
                Some(worker) => {
                    worker.intents.send_replace(intent);
                }
                None => self.spawn(workers, stopped, intent),
            }
        }

        for intent in diff.created {
            self.spawn(workers, stopped, intent);
        }
    }

    fn spawn(
        &self,
        workers: &mut FxHashMap<String, Worker>,
        stopped: &watch::Receiver<bool>,
        intent: Intent,
    ) {
        let span = info_span!("worker", intent = %intent.name);
        let name = intent.name.clone();
        let (intents, receiver) = watch::channel(intent);

        let handle = tokio::spawn(
            self.clone()
                .run_worker(receiver, stopped.clone())
                .instrument(span),
        );

        workers.insert(name, Worker { intents, handle });
    }
}

#[cfg(test)]
mod tests {
    use argocd_tokens::{
        fixtures::scoped_token,
        intent::CredentialRef,
        project::{ProjectRole, RemoteProject},
        remote::MockRemoteCredentialClient,
    };
    use jiff::Timestamp;
    use testresult::TestResult;
    use tokio::sync::oneshot;

    use crate::store::MemoryCredentialStore;

    use super::*;

    fn token_entry(name: &str) -> String {
        format!(
            "  - name: {name}
    spec:
      argocdEndpoint: https://argocd.internal
      project: default
      role: deployer
      expiresIn: 3600
      secretRef:
        name: {name}
        key: token
"
        )
    }

    fn issuing_client() -> MockRemoteCredentialClient {
        let mut client = MockRemoteCredentialClient::new();

        client.expect_fetch_project().returning(|_, _| {
            Ok(RemoteProject {
                roles: vec![ProjectRole {
                    name: "deployer".to_string(),
                    ..ProjectRole::default()
                }],
                ..RemoteProject::default()
            })
        });
        client
            .expect_issue_credential()
            .returning(|_, project, role, lifetime| {
                let now = Timestamp::now().as_second();

                Ok(scoped_token(project, role, now, now + lifetime))
            });

        client
    }

    async fn wait_for(store: &MemoryCredentialStore, reference: &CredentialRef) -> TestResult {
        time::timeout(Duration::from_secs(5), async {
            loop {
                if store.get(reference).await?.is_some() {
                    return Ok::<(), crate::store::StoreError>(());
                }

                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await??;

        Ok(())
    }

    #[tokio::test]
    async fn workers_follow_the_manifest_until_shutdown() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tokens.yaml");
        std::fs::write(&path, format!("tokens:\n{}", token_entry("first")))?;

        let store = Arc::new(MemoryCredentialStore::new());
        let controller = Controller::new(
            LifecycleReconciler::new(Arc::new(issuing_client())),
            store.clone(),
            ControllerSettings {
                manifest_poll: Duration::from_millis(20),
                ..ControllerSettings::default()
            },
        );

        let (stop, stopped) = oneshot::channel::<()>();
        let run_path = path.clone();
        let running = tokio::spawn(async move {
            controller
                .run(&run_path, async {
                    _ = stopped.await;
                })
                .await
        });

        wait_for(&store, &CredentialRef::new("first", "token")).await?;

        std::fs::write(
            &path,
            format!("tokens:\n{}{}", token_entry("first"), token_entry("second")),
        )?;

        wait_for(&store, &CredentialRef::new("second", "token")).await?;

        _ = stop.send(());
        running.await??;

        Ok(())
    }

    #[tokio::test]
    async fn unreadable_manifest_fails_startup() {
        let controller = Controller::new(
            LifecycleReconciler::new(Arc::new(MockRemoteCredentialClient::new())),
            Arc::new(MemoryCredentialStore::new()),
            ControllerSettings::default(),
        );

        let result = controller
            .run(Path::new("/nonexistent/tokens.yaml"), async {})
            .await;

        assert!(matches!(result, Err(ControllerError::Manifest { .. })));
    }
}
