use std::sync::{Arc, LazyLock};

use bytes::Bytes;
use depot::config::{EngineConfig, RepositoryConfig};
use depot::error::Result;
use depot::repository::{MemoryStatistics, RepositoryRegistry, RepositoryService};
use depot::types::{AccessTokenIdentity, Location, Permission};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

pub struct TestEngine {
    pub temp_dir: TempDir,
    pub config: EngineConfig,
    pub service: RepositoryService,
    pub statistics: Arc<MemoryStatistics>,
}

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("depot=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
});

impl TestEngine {
    pub async fn start(repositories: Vec<RepositoryConfig>) -> Self {
        LazyLock::force(&TRACING);

        let temp_dir = TempDir::new().expect("create temp dir");
        let config = EngineConfig {
            data_dir: temp_dir.path().to_path_buf(),
            repositories,
        };

        let registry = Arc::new(
            RepositoryRegistry::from_config(&config)
                .await
                .expect("build registry"),
        );
        let statistics = Arc::new(MemoryStatistics::new());
        let service = RepositoryService::new(registry).with_statistics(statistics.clone());

        Self {
            temp_dir,
            config,
            service,
            statistics,
        }
    }

    /// Deploys `content` as a manager without checksums.
    pub async fn deploy(&self, repository: &str, path: &str, content: impl Into<Bytes>) {
        self.service
            .deploy_bytes(Some(&manager()), repository, &loc(path), content, false)
            .await
            .unwrap_or_else(|e| panic!("deploy {repository}/{path}: {e}"));
    }

    pub async fn read(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        path: &str,
    ) -> Result<Bytes> {
        self.service.find_bytes(token, repository, &loc(path)).await
    }

    /// Path of a file inside a repository's storage directory.
    pub fn stored_path(&self, repository: &str, path: &str) -> std::path::PathBuf {
        self.config.repositories_dir().join(repository).join(path)
    }
}

pub fn loc(path: &str) -> Location {
    Location::parse(path).expect("valid location")
}

pub fn manager() -> AccessTokenIdentity {
    AccessTokenIdentity::new("admin").with_permissions(Permission::MANAGER)
}
