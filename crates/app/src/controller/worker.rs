//! Per-intent reconciliation passes.

use std::{future, time::Duration};

use argocd_tokens::{intent::Intent, reconciler::ReconcileOutcome};
use jiff::Timestamp;
use tokio::{sync::watch, time};
use tracing::{debug, error, info, warn};

use super::Controller;

/// When the next pass for an intent should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPass {
    /// Run again after the delay unless the intent changes first.
    After(Duration),

    /// Only a changed intent triggers another pass.
    AwaitUpdate,
}

impl Controller {
    /// Run one reconciliation pass for `intent` and persist what it issued.
    pub async fn reconcile_intent(&self, intent: &Intent) -> NextPass {
        let stored = match self.store.get(&intent.destination).await {
            Ok(stored) => stored,
            Err(error) => {
                warn!(intent = %intent.name, %error, "failed to read stored credential");
                return NextPass::After(self.settings.error_requeue);
            }
        };

        match self
            .reconciler
            .reconcile(intent, stored.as_deref(), Timestamp::now())
            .await
        {
            Ok(outcome) => self.persist(intent, outcome).await,
            Err(error) if error.kind().is_configuration_error() => {
                warn!(intent = %intent.name, %error, "waiting for the intent to change");
                NextPass::AwaitUpdate
            }
            Err(error) => {
                warn!(
                    intent = %intent.name,
                    kind = ?error.kind(),
                    %error,
                    retry_in = ?self.settings.error_requeue,
                    "reconciliation failed"
                );
                NextPass::After(self.settings.error_requeue)
            }
        }
    }

    async fn persist(&self, intent: &Intent, outcome: ReconcileOutcome) -> NextPass {
        if let Some(credential) = &outcome.credential {
            match self.store.put(&intent.destination, credential).await {
                Ok(write) => info!(
                    intent = %intent.name,
                    destination = %intent.destination,
                    action = ?outcome.action,
                    ?write,
                    "credential stored"
                ),
                Err(error) => {
                    error!(
                        intent = %intent.name,
                        destination = %intent.destination,
                        %error,
                        "failed to store issued credential"
                    );
                    return NextPass::After(self.settings.error_requeue);
                }
            }
        }

        if outcome.requeue_after.is_zero() {
            NextPass::After(self.settings.min_requeue)
        } else {
            NextPass::After(outcome.requeue_after)
        }
    }

    /// Drive passes for one intent until its sender is dropped or shutdown is
    /// signalled.
    pub(crate) async fn run_worker(
        self,
        mut intents: watch::Receiver<Intent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let intent = intents.borrow_and_update().clone();
            let next = self.reconcile_intent(&intent).await;

            debug!(intent = %intent.name, ?next, "pass finished");

            tokio::select! {
                changed = intents.changed() => {
                    if changed.is_err() {
                        debug!(intent = %intent.name, "intent removed");
                        break;
                    }
                }
                () = wait(next) => {}
                _ = shutdown.changed() => break,
            }
        }
    }
}

async fn wait(next: NextPass) {
    match next {
        NextPass::After(delay) => time::sleep(delay).await,
        NextPass::AwaitUpdate => future::pending().await,
    }
}
