//! Repositories and the service that orchestrates requests against them.

mod registry;
mod retention;
mod service;
mod statistics;

pub use registry::RepositoryRegistry;
pub use retention::PreservedBuildsListener;
pub use service::RepositoryService;
pub use statistics::{MemoryStatistics, NoopStatistics, StatisticsRecorder, should_record};

use std::path::Path;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::mirror::MirrorHost;
use crate::storage::{FileSystemStorageProvider, StorageProvider};
use crate::types::Visibility;

/// A named, independently configured artifact store.
pub struct Repository {
    pub name: String,
    pub visibility: Visibility,
    pub redeployment: bool,
    /// Snapshot builds to keep per version, -1 keeps all.
    pub preserved: i32,
    pub mirrors: Vec<MirrorHost>,
    storage: Arc<dyn StorageProvider>,
}

impl Repository {
    /// Opens a filesystem backed repository rooted at
    /// `<repositories_dir>/<name>`.
    pub async fn open(config: &RepositoryConfig, repositories_dir: &Path) -> Result<Self> {
        config.validate()?;
        let storage = FileSystemStorageProvider::new(
            repositories_dir.join(&config.name),
            config.parsed_quota()?,
        )
        .await?;
        Self::with_storage(config, Arc::new(storage))
    }

    /// Builds a repository over an arbitrary storage provider.
    pub fn with_storage(config: &RepositoryConfig, storage: Arc<dyn StorageProvider>) -> Result<Self> {
        let mirrors = config
            .mirrors
            .iter()
            .map(MirrorHost::from_config)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: config.name.clone(),
            visibility: config.visibility,
            redeployment: config.redeployment,
            preserved: config.preserved,
            mirrors,
            storage,
        })
    }

    #[must_use]
    pub fn storage(&self) -> &dyn StorageProvider {
        self.storage.as_ref()
    }

    /// Snapshot retention limit, `None` when unlimited.
    #[must_use]
    pub fn preserved_builds(&self) -> Option<usize> {
        usize::try_from(self.preserved).ok()
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("redeployment", &self.redeployment)
            .field("preserved", &self.preserved)
            .field("mirrors", &self.mirrors)
            .finish_non_exhaustive()
    }
}
