//! In-process credential store.

use argocd_tokens::intent::CredentialRef;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;

use super::{CredentialStore, StoreError, WriteOutcome, validate_container};

type Containers = FxHashMap<String, FxHashMap<String, String>>;

/// Credential store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    containers: RwLock<Containers>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every field in `container`.
    pub async fn container(&self, container: &str) -> Option<FxHashMap<String, String>> {
        self.containers.read().await.get(container).cloned()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, reference: &CredentialRef) -> Result<Option<String>, StoreError> {
        validate_container(&reference.container)?;

        let containers = self.containers.read().await;

        Ok(containers
            .get(&reference.container)
            .and_then(|fields| fields.get(&reference.key))
            .cloned())
    }

    async fn put(
        &self,
        reference: &CredentialRef,
        value: &str,
    ) -> Result<WriteOutcome, StoreError> {
        validate_container(&reference.container)?;

        let mut containers = self.containers.write().await;

        if let Some(fields) = containers.get_mut(&reference.container) {
            fields.insert(reference.key.clone(), value.to_string());

            return Ok(WriteOutcome::Patched);
        }

        let mut fields = FxHashMap::default();
        fields.insert(reference.key.clone(), value.to_string());
        containers.insert(reference.container.clone(), fields);

        Ok(WriteOutcome::Created)
    }
}
