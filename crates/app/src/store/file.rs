//! Credential store backed by one YAML file per container.

use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use argocd_tokens::intent::CredentialRef;
use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::debug;

use super::{CredentialStore, StoreError, WriteOutcome, validate_container};

type Fields = BTreeMap<String, String>;

/// Stores each container as `<dir>/<container>.yaml`, a flat mapping of
/// field names to values.
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug)]
pub struct FileCredentialStore {
    dir: PathBuf,
    writes: Mutex<()>,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writes: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn container_path(&self, container: &str) -> Result<PathBuf, StoreError> {
        validate_container(container)?;

        Ok(self.dir.join(format!("{container}.yaml")))
    }

    async fn read_fields(path: &Path) -> Result<Option<Fields>, StoreError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Some(Fields::new()));
        }

        serde_norway::from_str(&contents)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write_fields(&self, path: &Path, fields: &Fields) -> Result<(), StoreError> {
        let contents = serde_norway::to_string(fields).map_err(StoreError::Encode)?;
        let staging = path.with_extension("yaml.tmp");

        fs::create_dir_all(&self.dir)
            .await
            .map_err(io_error(&self.dir))?;

        // A leftover from an interrupted write would keep its old mode.
        if let Err(source) = fs::remove_file(&staging).await
            && source.kind() != ErrorKind::NotFound
        {
            return Err(io_error(&staging)(source));
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&staging).await.map_err(io_error(&staging))?;

        file.write_all(contents.as_bytes())
            .await
            .map_err(io_error(&staging))?;
        file.sync_all().await.map_err(io_error(&staging))?;
        drop(file);

        fs::rename(&staging, path).await.map_err(io_error(path))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();

    move |source| StoreError::Io { path, source }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, reference: &CredentialRef) -> Result<Option<String>, StoreError> {
        let path = self.container_path(&reference.container)?;

        Ok(Self::read_fields(&path)
            .await?
            .and_then(|mut fields| fields.remove(&reference.key)))
    }

    async fn put(
        &self,
        reference: &CredentialRef,
        value: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let path = self.container_path(&reference.container)?;

        // Serialize read-modify-write so two keys of one container never race.
        let _guard = self.writes.lock().await;

        let (mut fields, outcome) = match Self::read_fields(&path).await? {
            Some(fields) => (fields, WriteOutcome::Patched),
            None => (Fields::new(), WriteOutcome::Created),
        };

        fields.insert(reference.key.clone(), value.to_string());

        self.write_fields(&path, &fields).await?;

        debug!(container = %reference.container, key = %reference.key, ?outcome, "credential written");

        Ok(outcome)
    }
}
