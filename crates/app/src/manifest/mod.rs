//! Intent manifest loading and change detection.

use std::{io, path::Path};

use argocd_tokens::intent::Intent;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::fs;

use self::models::ManifestDocument;

mod models;

/// Manifest loading errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// IO error reading the manifest file
    #[error("failed to read manifest: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing error
    #[error("failed to parse manifest YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A token entry without a name
    #[error("token entry {0} has an empty name")]
    EmptyName(usize),

    /// Two token entries share a name
    #[error("duplicate token name: {0}")]
    DuplicateName(String),
}

/// The declared set of intents, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    intents: FxHashMap<String, Intent>,
}

/// Differences between two manifest loads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestDiff {
    /// Intents that were not declared before.
    pub created: Vec<Intent>,

    /// Intents whose declaration changed.
    pub updated: Vec<Intent>,

    /// Names of intents that are no longer declared.
    pub deleted: Vec<String>,
}

impl Manifest {
    /// Parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed YAML, an unnamed entry or a duplicated
    /// name.
    pub fn parse(yaml: &str) -> Result<Self, ManifestError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let document: ManifestDocument = serde_norway::from_str(yaml)?;
        let mut intents = FxHashMap::default();

        for (index, resource) in document.tokens.into_iter().enumerate() {
            if resource.name.trim().is_empty() {
                return Err(ManifestError::EmptyName(index));
            }

            let intent = Intent::from(resource);

            if intents.contains_key(&intent.name) {
                return Err(ManifestError::DuplicateName(intent.name));
            }

            intents.insert(intent.name.clone(), intent);
        }

        Ok(Self { intents })
    }

    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let yaml = fs::read_to_string(path).await?;

        Self::parse(&yaml)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Intent> {
        self.intents.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Declared intents, ordered by name.
    #[must_use]
    pub fn intents(&self) -> Vec<&Intent> {
        let mut intents: Vec<&Intent> = self.intents.values().collect();
        intents.sort_by(|a, b| a.name.cmp(&b.name));
        intents
    }

    /// Changes needed to go from `self` to `next`, each list ordered by name.
    #[must_use]
    pub fn diff(&self, next: &Self) -> ManifestDiff {
        let mut diff = ManifestDiff::default();

        for intent in next.intents() {
            match self.intents.get(&intent.name) {
                None => diff.created.push(intent.clone()),
                Some(previous) if previous != intent => diff.updated.push(intent.clone()),
                Some(_) => {}
            }
        }

        diff.deleted = self
            .intents()
            .into_iter()
            .filter(|intent| !next.intents.contains_key(&intent.name))
            .map(|intent| intent.name.clone())
            .collect();

        diff
    }
}

impl ManifestDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use argocd_tokens::intent::CredentialRef;
    use testresult::TestResult;

    use super::*;

    const MANIFEST: &str = r"
tokens:
  - name: ci-deployer
    spec:
      argocdEndpoint: https://argocd.internal
      project: default
      role: deployer
      expiresIn: 3600
      secretRef:
        name: ci-deployer-token
        key: token
  - name: auditor
    spec:
      argocdEndpoint: https://argocd.internal
      project: audit
      role: read-only
      expiresIn: 86400
      secretRef:
        name: auditor-token
        key: token
";

    #[test]
    fn parses_token_entries_into_intents() -> TestResult {
        let manifest = Manifest::parse(MANIFEST)?;

        assert_eq!(manifest.len(), 2);

        let intent = manifest.get("ci-deployer").ok_or("intent missing")?;

        assert_eq!(intent.endpoint, "https://argocd.internal");
        assert_eq!(intent.project, "default");
        assert_eq!(intent.role, "deployer");
        assert_eq!(intent.lifetime_seconds, 3_600);
        assert_eq!(
            intent.destination,
            CredentialRef::new("ci-deployer-token", "token")
        );

        let names: Vec<&str> = manifest.intents().iter().map(|i| i.name.as_str()).collect();

        assert_eq!(names, ["auditor", "ci-deployer"]);

        Ok(())
    }

    #[test]
    fn empty_document_is_an_empty_manifest() -> TestResult {
        assert!(Manifest::parse("")?.is_empty());
        assert!(Manifest::parse("tokens: []")?.is_empty());

        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = format!("{MANIFEST}{}", MANIFEST.replace("tokens:\n", ""));

        assert!(matches!(
            Manifest::parse(&yaml),
            Err(ManifestError::DuplicateName(name)) if name == "ci-deployer"
        ));
    }

    #[test]
    fn missing_spec_field_is_a_yaml_error() {
        let yaml = "tokens:\n  - name: broken\n    spec:\n      project: default\n";

        assert!(matches!(Manifest::parse(yaml), Err(ManifestError::Yaml(_))));
    }

    #[test]
    fn unnamed_entry_is_rejected() {
        let yaml = MANIFEST.replace("name: auditor", "name: ''");

        assert!(matches!(
            Manifest::parse(&yaml),
            Err(ManifestError::EmptyName(1))
        ));
    }

    #[test]
    fn diff_reports_created_updated_and_deleted() -> TestResult {
        let before = Manifest::parse(MANIFEST)?;
        let after = Manifest::parse(
            &MANIFEST
                .replace("expiresIn: 3600", "expiresIn: 7200")
                .replace("name: auditor", "name: reporter"),
        )?;

        let diff = before.diff(&after);

        assert_eq!(
            diff.created.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            ["reporter"]
        );
        assert_eq!(
            diff.updated.iter().map(|i| i.lifetime_seconds).collect::<Vec<_>>(),
            [7_200]
        );
        assert_eq!(diff.deleted, ["auditor"]);
        assert!(before.diff(&before).is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn load_reads_from_disk() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tokens.yaml");
        std::fs::write(&path, MANIFEST)?;

        let manifest = Manifest::load(&path).await?;

        assert_eq!(manifest.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let result = Manifest::load(Path::new("/nonexistent/tokens.yaml")).await;

        assert!(matches!(result, Err(ManifestError::Io(_))));
    }
}
