use std::sync::Arc;

use super::{
    NoopStatistics, PreservedBuildsListener, Repository, RepositoryRegistry, StatisticsRecorder,
    should_record,
};
use crate::auth::SecurityProvider;
use crate::checksum::{ChecksumType, is_checksum_file};
use crate::error::{Error, Result};
use crate::events::{DeployEvent, Events, PreResolveEvent, ResolvedFileEvent};
use crate::metadata::{MetadataService, is_metadata_location, merge_metadata, metadata_target};
use crate::mirror::MirrorResolver;
use crate::storage::{
    ContentStream, Document, directory_exists, read_to_bytes, stream_from_bytes,
};
use crate::types::{AccessTokenIdentity, FileDetails, Location};

/// Entry point for deploying, deleting and resolving files.
///
/// Every operation checks access first, then works against local storage,
/// generated metadata and mirrors, publishing events along the way.
pub struct RepositoryService {
    registry: Arc<RepositoryRegistry>,
    metadata: Arc<MetadataService>,
    mirrors: MirrorResolver,
    security: SecurityProvider,
    events: Arc<Events>,
    statistics: Arc<dyn StatisticsRecorder>,
}

impl RepositoryService {
    /// Creates a service with snapshot retention installed.
    pub fn new(registry: Arc<RepositoryRegistry>) -> Self {
        let metadata = Arc::new(MetadataService::new());
        let events = Arc::new(Events::default());
        events.deploy.subscribe(Arc::new(PreservedBuildsListener::new(
            Arc::clone(&registry),
            Arc::clone(&metadata),
        )));

        Self {
            mirrors: MirrorResolver::new(Arc::clone(&registry), Arc::clone(&metadata)),
            registry,
            metadata,
            security: SecurityProvider::new(),
            events,
            statistics: Arc::new(NoopStatistics),
        }
    }

    #[must_use]
    pub fn with_statistics(mut self, statistics: Arc<dyn StatisticsRecorder>) -> Self {
        self.statistics = statistics;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn metadata(&self) -> &Arc<MetadataService> {
        &self.metadata
    }

    #[must_use]
    pub fn events(&self) -> &Arc<Events> {
        &self.events
    }

    /// Stores a file, optionally writing checksum siblings for it.
    pub async fn deploy_file(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
        content: ContentStream,
        generate_checksums: bool,
    ) -> Result<()> {
        let repository = self.repository(repository)?;
        let principal = self.authorize_modify(token, &repository, location)?;

        let storage = repository.storage();
        if directory_exists(storage, location).await? {
            return Err(Error::conflict(format!(
                "{} is a directory",
                location.route_path(&repository.name)
            )));
        }

        let redeploy_blocked = !repository.redeployment
            && !is_metadata_location(location)
            && storage.exists(location).await?;
        if redeploy_blocked {
            return Err(Error::conflict(format!(
                "Redeployment of {} is not allowed",
                location.route_path(&repository.name)
            )));
        }

        storage.put_file(location, content).await?;

        if generate_checksums && !is_checksum_file(location.file_name()) {
            let data = storage.get_file(location).await?.into_bytes().await?;
            for checksum in ChecksumType::ALL {
                storage
                    .put_file(
                        &location.with_suffix(checksum.suffix())?,
                        stream_from_bytes(checksum.compute(&data)),
                    )
                    .await?;
            }
        }

        self.metadata.invalidate(&repository.name, location);
        tracing::info!(
            "Deployed {} by {principal}",
            location.route_path(&repository.name)
        );

        self.events
            .deploy
            .publish(&DeployEvent {
                repository: repository.name.clone(),
                location: location.clone(),
                principal,
            })
            .await;
        Ok(())
    }

    /// Convenience wrapper around `deploy_file` for in-memory content.
    pub async fn deploy_bytes(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
        content: impl Into<bytes::Bytes>,
        generate_checksums: bool,
    ) -> Result<()> {
        self.deploy_file(
            token,
            repository,
            location,
            stream_from_bytes(content),
            generate_checksums,
        )
        .await
    }

    pub async fn delete_file(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
    ) -> Result<()> {
        let repository = self.repository(repository)?;
        let principal = self.authorize_modify(token, &repository, location)?;

        repository.storage().remove_file(location).await?;
        self.metadata.invalidate(&repository.name, location);

        tracing::info!(
            "Deleted {} by {principal}",
            location.route_path(&repository.name)
        );
        Ok(())
    }

    pub async fn find_details(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
    ) -> Result<FileDetails> {
        let repository = self.repository(repository)?;
        self.authorize_read(token, &repository, location)?;
        self.publish_pre_resolve(token, &repository, location).await;

        let result = self.resolve_details(token, &repository, location).await;

        self.publish_resolved(token, &repository, location, result.as_ref().ok().cloned())
            .await;
        result
    }

    pub async fn find_file(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
    ) -> Result<Document> {
        let repository = self.repository(repository)?;
        self.authorize_read(token, &repository, location)?;
        self.publish_pre_resolve(token, &repository, location).await;

        let result = self.resolve_file(&repository, location).await;

        let details = result
            .as_ref()
            .ok()
            .map(|document| FileDetails::Document(document.details.clone()));
        if details.is_some() && should_record(location) {
            self.statistics.record_resolved(&repository.name, location);
        }
        self.publish_resolved(token, &repository, location, details)
            .await;
        result
    }

    /// Reads a whole file into memory.
    pub async fn find_bytes(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        location: &Location,
    ) -> Result<bytes::Bytes> {
        let document = self.find_file(token, repository, location).await?;
        read_to_bytes(document.content).await
    }

    /// Names of the repositories the token may see, in configuration order.
    #[must_use]
    pub fn find_repositories(&self, token: Option<&AccessTokenIdentity>) -> Vec<String> {
        self.registry
            .repositories()
            .iter()
            .filter(|repository| self.security.can_access_repository(token, repository))
            .map(|repository| repository.name.clone())
            .collect()
    }

    /// Highest version of the artifact at `artifact`, optionally limited to
    /// versions starting with `filter`.
    pub async fn find_latest_version(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &str,
        artifact: &Location,
        filter: Option<&str>,
    ) -> Result<String> {
        let repository = self.repository(repository)?;
        self.authorize_read(token, &repository, artifact)?;
        self.metadata
            .latest_version(&repository, artifact, filter)
            .await
    }

    async fn resolve_details(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<FileDetails> {
        if is_metadata_location(location) {
            if let Some(document) = self.metadata_document(repository, location).await? {
                return Ok(FileDetails::Document(document.details));
            }
        }

        let storage = repository.storage();
        if location.is_root() || storage.exists(location).await? {
            let details = storage.get_file_details(location).await?;
            if details.is_directory() {
                self.authorize_browse(token, repository, location)?;
            }
            return Ok(details);
        }

        if let Some(resolved) = self
            .metadata
            .resolve_snapshot_location(repository, location)
            .await?
        {
            if storage.exists(&resolved).await? {
                return storage.get_file_details(&resolved).await;
            }
        }

        let details = self.mirrors.find_details(repository, location).await?;
        if details.is_directory() {
            self.authorize_browse(token, repository, location)?;
        }
        Ok(details)
    }

    async fn resolve_file(&self, repository: &Repository, location: &Location) -> Result<Document> {
        if is_metadata_location(location) {
            if let Some(document) = self.metadata_document(repository, location).await? {
                return Ok(document);
            }
        }

        let storage = repository.storage();
        if storage.exists(location).await? {
            return storage.get_file(location).await;
        }

        if let Some(resolved) = self
            .metadata
            .resolve_snapshot_location(repository, location)
            .await?
        {
            if storage.exists(&resolved).await? {
                return storage.get_file(&resolved).await;
            }
        }

        self.mirrors.find_file(repository, location).await
    }

    /// Metadata document or checksum at `location`. Repositories with
    /// mirrors merge the local document with the upstream one.
    async fn metadata_document(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<Option<Document>> {
        if repository.mirrors.is_empty() {
            return self
                .metadata
                .find_metadata_document(repository, location)
                .await;
        }
        let Some(target) = metadata_target(location) else {
            return Ok(None);
        };

        let local = match self.metadata.find_metadata(repository, &target).await {
            Ok(metadata) => Some(metadata),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let upstream = self.mirrors.find_metadata(repository, &target).await;

        Ok(merge_metadata(local, upstream)?.and_then(|metadata| metadata.document_for(location)))
    }

    fn repository(&self, name: &str) -> Result<Arc<Repository>> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Repository {name} not found")))
    }

    fn authorize_read(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<()> {
        self.security
            .require_access(token, repository, location)
            .inspect_err(|e| log_rejection(token, e))
    }

    fn authorize_browse(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<()> {
        self.security
            .require_browse(token, repository, location)
            .inspect_err(|e| log_rejection(token, e))
    }

    /// Checks write access and returns the principal to record.
    fn authorize_modify(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) -> Result<String> {
        self.security
            .require_modify(token, repository, location)
            .inspect_err(|e| log_rejection(token, e))?;
        Ok(token.map_or_else(|| "anonymous".to_string(), |t| t.name.clone()))
    }

    async fn publish_pre_resolve(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
    ) {
        self.events
            .pre_resolve
            .publish(&PreResolveEvent {
                token: token.map(|t| t.name.clone()),
                repository: repository.name.clone(),
                location: location.clone(),
            })
            .await;
    }

    async fn publish_resolved(
        &self,
        token: Option<&AccessTokenIdentity>,
        repository: &Repository,
        location: &Location,
        details: Option<FileDetails>,
    ) {
        self.events
            .resolved
            .publish(&ResolvedFileEvent {
                token: token.map(|t| t.name.clone()),
                repository: repository.name.clone(),
                location: location.clone(),
                details,
            })
            .await;
    }
}

fn log_rejection(token: Option<&AccessTokenIdentity>, error: &Error) {
    let principal = token.map_or("anonymous", |t| t.name.as_str());
    tracing::info!("Rejected request from {principal}: {error}");
}
