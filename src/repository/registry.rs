use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Repository;
use crate::config::EngineConfig;
use crate::error::{Error, Result};

#[derive(Default)]
struct Snapshot {
    ordered: Vec<Arc<Repository>>,
    by_name: HashMap<String, Arc<Repository>>,
}

/// The set of configured repositories.
///
/// Readers get a consistent snapshot; `rebuild` swaps in a new one without
/// blocking requests that already hold a repository.
#[derive(Default)]
pub struct RepositoryRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl RepositoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_config(config: &EngineConfig) -> Result<Self> {
        let registry = Self::new();
        registry.rebuild(config).await?;
        Ok(registry)
    }

    /// Replaces every repository with the ones described by `config`.
    pub async fn rebuild(&self, config: &EngineConfig) -> Result<()> {
        config.validate()?;

        for repository in &config.repositories {
            for mirror in repository.mirrors.iter().filter(|m| !m.is_remote()) {
                if config.repository(&mirror.reference).is_none() {
                    return Err(Error::Config(format!(
                        "repository {} mirrors unknown repository {}",
                        repository.name, mirror.reference
                    )));
                }
            }
        }

        let repositories_dir = config.repositories_dir();
        let mut snapshot = Snapshot::default();
        for repository_config in &config.repositories {
            let repository =
                Arc::new(Repository::open(repository_config, &repositories_dir).await?);
            snapshot
                .by_name
                .insert(repository.name.clone(), Arc::clone(&repository));
            snapshot.ordered.push(repository);
        }

        tracing::info!(
            "Loaded {} repositories from {}",
            snapshot.ordered.len(),
            repositories_dir.display()
        );

        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
        Ok(())
    }

    /// Registers a single repository, replacing any with the same name.
    pub fn insert(&self, repository: Repository) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        let repository = Arc::new(repository);

        let mut ordered: Vec<Arc<Repository>> = current
            .ordered
            .iter()
            .filter(|r| r.name != repository.name)
            .cloned()
            .collect();
        ordered.push(Arc::clone(&repository));

        let by_name = ordered
            .iter()
            .map(|r| (r.name.clone(), Arc::clone(r)))
            .collect();

        *current = Arc::new(Snapshot { ordered, by_name });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Repository>> {
        self.snapshot().by_name.get(name).cloned()
    }

    /// All repositories in configuration order.
    #[must_use]
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.snapshot().ordered.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().ordered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }
}
