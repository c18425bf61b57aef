use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::model::{
    LAST_UPDATED_FORMAT, Metadata, Snapshot, SnapshotVersion, SnapshotVersions, Versioning,
    Versions, parse_metadata, serialize_metadata,
};
use super::snapshot::{
    base_version, is_snapshot_version, parse_build_id, parse_snapshot_file, with_build_id,
};
use super::{METADATA_FILE, is_metadata_file, metadata_target};
use crate::checksum::{ChecksumType, is_checksum_file};
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::storage::{Document, directory_exists, stream_from_bytes};
use crate::types::{DocumentInfo, FileDetails, Location};
use crate::version::{compare_versions, sort_versions};

/// Metadata as served to clients.
#[derive(Debug, Clone)]
pub struct GeneratedMetadata {
    pub metadata: Metadata,
    pub content: Bytes,
    pub last_modified: DateTime<Utc>,
}

impl GeneratedMetadata {
    #[must_use]
    pub fn details(&self) -> DocumentInfo {
        let mut details = DocumentInfo::new(METADATA_FILE, self.content.len() as u64);
        details.last_modified = Some(self.last_modified);
        details
    }

    #[must_use]
    pub fn into_document(self) -> Document {
        Document {
            details: self.details(),
            content: stream_from_bytes(self.content),
        }
    }

    /// The document itself or one of its checksum siblings, picked by the
    /// file name of `location`.
    #[must_use]
    pub fn document_for(&self, location: &Location) -> Option<Document> {
        let file_name = location.file_name();
        if file_name == METADATA_FILE {
            return Some(self.clone().into_document());
        }

        let checksum = ChecksumType::ALL.into_iter().find(|checksum| {
            file_name.strip_suffix(checksum.suffix()) == Some(METADATA_FILE)
        })?;
        let digest = checksum.compute(&self.content);
        let mut details = DocumentInfo::new(file_name, digest.len() as u64);
        details.last_modified = Some(self.last_modified);
        Some(Document {
            details,
            content: stream_from_bytes(digest),
        })
    }
}

#[derive(Default)]
struct MetadataCache {
    entries: HashMap<String, Arc<GeneratedMetadata>>,
    /// Bumped by every invalidation of a key.
    epochs: HashMap<String, u64>,
}

impl MetadataCache {
    fn epoch(&self, key: &str) -> u64 {
        self.epochs.get(key).copied().unwrap_or_default()
    }
}

/// Generates, caches and persists `maven-metadata.xml` documents.
#[derive(Default)]
pub struct MetadataService {
    cache: RwLock<MetadataCache>,
}

impl MetadataService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the metadata document at `location`.
    ///
    /// Served from the cache when present, otherwise generated from the
    /// directory listing, otherwise read from a stored client-deployed
    /// document. A stored document describing other coordinates than the
    /// generated one (group level plugin metadata) is served as is.
    pub async fn find_metadata(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<Arc<GeneratedMetadata>> {
        if !is_metadata_file(location) {
            return Err(Error::bad_request(format!(
                "{location} is not a metadata file"
            )));
        }

        let key = cache_key(&repository.name, location);
        let epoch = match self.cached(&key) {
            (Some(cached), _) => return Ok(cached),
            (None, epoch) => epoch,
        };

        let directory = location.parent().unwrap_or_else(Location::root);
        let generated = if is_snapshot_version(directory.file_name()) {
            self.snapshot_listing(repository, &directory).await?
        } else {
            self.release_listing(repository, &directory).await?
        };
        let stored = self.stored_metadata(repository, location).await;

        match (generated, stored) {
            (Some(metadata), Ok(stored)) if !same_coordinates(&metadata, &stored.metadata) => {
                tracing::debug!(
                    "Serving stored metadata {location} of {} unchanged",
                    repository.name
                );
                Ok(self.insert(key, epoch, stored))
            }
            (Some(metadata), _) => self.persist(repository, location, metadata, epoch).await,
            (None, Ok(stored)) => Ok(self.insert(key, epoch, stored)),
            (None, Err(e)) => Err(e),
        }
    }

    /// Like `find_metadata`, also serving the checksum siblings of a
    /// metadata file. Returns `None` for other locations or when no
    /// metadata exists.
    pub async fn find_metadata_document(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<Option<Document>> {
        let Some(target) = metadata_target(location) else {
            return Ok(None);
        };
        match self.find_metadata(repository, &target).await {
            Ok(metadata) => Ok(metadata.document_for(location)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serializes and persists a metadata document with its checksums and
    /// caches the result.
    pub async fn store_metadata(
        &self,
        repository: &Repository,
        location: &Location,
        metadata: Metadata,
    ) -> Result<Arc<GeneratedMetadata>> {
        let (_, epoch) = self.cached(&cache_key(&repository.name, location));
        self.persist(repository, location, metadata, epoch).await
    }

    async fn persist(
        &self,
        repository: &Repository,
        location: &Location,
        metadata: Metadata,
        epoch: u64,
    ) -> Result<Arc<GeneratedMetadata>> {
        let content = Bytes::from(serialize_metadata(&metadata)?);

        if let Err(e) = write_with_checksums(repository, location, &content).await {
            tracing::warn!(
                "Failed to persist metadata {} in {}: {e}",
                location,
                repository.name
            );
        }

        let generated = GeneratedMetadata {
            metadata,
            content,
            last_modified: Utc::now(),
        };
        Ok(self.insert(cache_key(&repository.name, location), epoch, generated))
    }

    /// Drops cached metadata affected by a change at `location`: the
    /// document of its directory and the one of the directory above.
    ///
    /// Listings built before the call never reach the cache afterwards.
    pub fn invalidate(&self, repository: &str, location: &Location) {
        let Some(directory) = location.parent() else {
            return;
        };

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        for dir in [Some(directory.clone()), directory.parent()].into_iter().flatten() {
            if let Ok(metadata) = dir.resolve(METADATA_FILE) {
                let key = cache_key(repository, &metadata);
                cache.entries.remove(&key);
                *cache.epochs.entry(key).or_default() += 1;
            }
        }
    }

    /// Maps a request for `<artifact>-<base>-SNAPSHOT[...]` to the newest
    /// timestamped build. Returns `None` when the location is not a
    /// snapshot request or no build is known.
    pub async fn resolve_snapshot_location(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<Option<Location>> {
        let Some(version_dir) = location.parent() else {
            return Ok(None);
        };
        let version = version_dir.file_name();
        if !is_snapshot_version(version) || !location.file_name().contains("SNAPSHOT") {
            return Ok(None);
        }
        let Some(artifact_dir) = version_dir.parent().filter(|dir| !dir.is_root()) else {
            return Ok(None);
        };
        let artifact_id = artifact_dir.file_name();

        let metadata = match self
            .find_metadata(repository, &version_dir.resolve(METADATA_FILE)?)
            .await
        {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(build_id) = metadata.metadata.snapshot().and_then(|s| s.build_id()) else {
            return Ok(None);
        };

        with_build_id(location.file_name(), artifact_id, version, &build_id)
            .map(|name| version_dir.resolve(&name))
            .transpose()
    }

    /// Highest listed version of an artifact, optionally restricted to
    /// versions starting with `filter`.
    pub async fn latest_version(
        &self,
        repository: &Repository,
        artifact: &Location,
        filter: Option<&str>,
    ) -> Result<String> {
        let metadata = self
            .find_metadata(repository, &artifact.resolve(METADATA_FILE)?)
            .await?;

        metadata
            .metadata
            .versions()
            .iter()
            .filter(|version| filter.is_none_or(|prefix| version.starts_with(prefix)))
            .max_by(|a, b| compare_versions(a, b))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("No matching versions of {artifact}")))
    }

    async fn release_listing(
        &self,
        repository: &Repository,
        artifact_dir: &Location,
    ) -> Result<Option<Metadata>> {
        let Some(files) = list_directory(repository, artifact_dir).await? else {
            return Ok(None);
        };

        // Listings are sorted by version, so the last directory is the highest.
        let mut versions = Vec::new();
        for file in files.iter().filter(|file| file.is_directory()) {
            if is_version_directory(repository, artifact_dir, file.name()).await? {
                versions.push(file.name().to_string());
            }
        }
        let Some(latest) = versions.last().cloned() else {
            return Ok(None);
        };

        let last_updated = repository
            .storage()
            .get_last_modified_time(&artifact_dir.resolve(&latest)?)
            .await
            .unwrap_or_else(|_| Utc::now());

        let (group_id, artifact_id) = coordinates(artifact_dir);
        Ok(Some(Metadata {
            group_id,
            artifact_id,
            version: None,
            versioning: Some(Versioning {
                latest: Some(latest.clone()),
                release: Some(latest),
                versions: Some(Versions { versions }),
                last_updated: Some(last_updated.format(LAST_UPDATED_FORMAT).to_string()),
                ..Versioning::default()
            }),
        }))
    }

    async fn snapshot_listing(
        &self,
        repository: &Repository,
        version_dir: &Location,
    ) -> Result<Option<Metadata>> {
        let Some(artifact_dir) = version_dir.parent().filter(|dir| !dir.is_root()) else {
            return Ok(None);
        };
        let Some(files) = list_directory(repository, version_dir).await? else {
            return Ok(None);
        };

        let version = version_dir.file_name();
        let artifact_id = artifact_dir.file_name();

        let mut entries = Vec::new();
        let mut newest: Option<DateTime<Utc>> = None;
        let mut boundary: Option<String> = None;

        for file in &files {
            let FileDetails::Document(document) = file else {
                continue;
            };
            if is_checksum_file(&document.name) || document.name.starts_with(METADATA_FILE) {
                continue;
            }
            let Some(parsed) = parse_snapshot_file(&document.name, artifact_id, version) else {
                continue;
            };

            let updated = document.last_modified.unwrap_or_else(Utc::now);
            newest = newest.max(Some(updated));

            if parse_build_id(&parsed.build_id).is_some()
                && boundary
                    .as_deref()
                    .is_none_or(|current| compare_versions(&parsed.build_id, current).is_gt())
            {
                boundary = Some(parsed.build_id.clone());
            }

            entries.push(SnapshotVersion {
                classifier: parsed.classifier,
                extension: parsed.extension,
                value: format!("{}-{}", base_version(version), parsed.build_id),
                updated: updated.format(LAST_UPDATED_FORMAT).to_string(),
            });
        }

        if entries.is_empty() {
            return Ok(None);
        }

        let snapshot = boundary
            .as_deref()
            .and_then(parse_build_id)
            .unwrap_or(Snapshot {
                timestamp: None,
                build_number: None,
                local_copy: Some(true),
            });

        let (group_id, _) = coordinates(&artifact_dir);
        Ok(Some(Metadata {
            group_id,
            artifact_id: Some(artifact_id.to_string()),
            version: Some(version.to_string()),
            versioning: Some(Versioning {
                snapshot: Some(snapshot),
                last_updated: Some(
                    newest
                        .unwrap_or_else(Utc::now)
                        .format(LAST_UPDATED_FORMAT)
                        .to_string(),
                ),
                snapshot_versions: Some(SnapshotVersions { entries }),
                ..Versioning::default()
            }),
        }))
    }

    async fn stored_metadata(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<GeneratedMetadata> {
        let document = repository.storage().get_file(location).await?;
        let last_modified = document.details.last_modified.unwrap_or_else(Utc::now);
        let content = document.into_bytes().await?;
        let metadata = parse_metadata(&content)?;

        Ok(GeneratedMetadata {
            metadata,
            content,
            last_modified,
        })
    }

    /// Cached entry for `key` with the epoch it was looked up at.
    fn cached(&self, key: &str) -> (Option<Arc<GeneratedMetadata>>, u64) {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        (cache.entries.get(key).cloned(), cache.epoch(key))
    }

    /// Caches `generated` unless `key` was invalidated since `epoch`.
    fn insert(&self, key: String, epoch: u64, generated: GeneratedMetadata) -> Arc<GeneratedMetadata> {
        let generated = Arc::new(generated);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.epoch(&key) == epoch {
            cache.entries.insert(key, Arc::clone(&generated));
        } else {
            tracing::debug!("Not caching {key}, invalidated while it was built");
        }
        generated
    }
}

/// Combines local metadata with the document of a mirror host.
///
/// Release listings are merged into the union of both version lists.
/// Other documents are not merged, the one updated last wins and the
/// upstream copy wins ties.
pub fn merge_metadata(
    local: Option<Arc<GeneratedMetadata>>,
    upstream: Option<GeneratedMetadata>,
) -> Result<Option<Arc<GeneratedMetadata>>> {
    let (local, upstream) = match (local, upstream) {
        (None, None) => return Ok(None),
        (Some(local), None) => return Ok(Some(local)),
        (None, Some(upstream)) => return Ok(Some(Arc::new(upstream))),
        (Some(local), Some(upstream)) => (local, upstream),
    };

    if local.metadata.versions().is_empty() || upstream.metadata.versions().is_empty() {
        if last_updated(&local.metadata) > last_updated(&upstream.metadata) {
            return Ok(Some(local));
        }
        return Ok(Some(Arc::new(upstream)));
    }

    let mut versions = upstream.metadata.versions().to_vec();
    for version in local.metadata.versions() {
        if !versions.contains(version) {
            versions.push(version.clone());
        }
    }
    sort_versions(&mut versions);

    let newest_update = last_updated(&local.metadata)
        .max(last_updated(&upstream.metadata))
        .map(str::to_string);
    let last_modified = local.last_modified.max(upstream.last_modified);

    let mut metadata = upstream.metadata;
    let versioning = metadata.versioning.get_or_insert_with(Versioning::default);
    versioning.latest = versions.last().cloned();
    versioning.release = versions.last().cloned();
    versioning.versions = Some(Versions { versions });
    versioning.last_updated = newest_update;

    let content = Bytes::from(serialize_metadata(&metadata)?);
    Ok(Some(Arc::new(GeneratedMetadata {
        metadata,
        content,
        last_modified,
    })))
}

fn last_updated(metadata: &Metadata) -> Option<&str> {
    metadata
        .versioning
        .as_ref()
        .and_then(|versioning| versioning.last_updated.as_deref())
}

/// Whether a stored document describes the same artifact as a generated one.
fn same_coordinates(generated: &Metadata, stored: &Metadata) -> bool {
    stored.artifact_id == generated.artifact_id
        && (stored.group_id.is_none() || stored.group_id == generated.group_id)
}

/// True when `<artifact_dir>/<version>` holds files of that version of the
/// artifact, as opposed to being an artifact directory of a group.
async fn is_version_directory(
    repository: &Repository,
    artifact_dir: &Location,
    version: &str,
) -> Result<bool> {
    let Some(files) = list_directory(repository, &artifact_dir.resolve(version)?).await? else {
        return Ok(false);
    };

    let artifact_id = artifact_dir.file_name();
    let release_prefix = format!("{artifact_id}-{version}");
    let snapshot_prefix = format!("{artifact_id}-{}-", base_version(version));
    Ok(files.iter().any(|file| {
        !file.is_directory()
            && (file.name().starts_with(&release_prefix)
                || (is_snapshot_version(version) && file.name().starts_with(&snapshot_prefix)))
    }))
}

fn cache_key(repository: &str, location: &Location) -> String {
    location.route_path(repository)
}

/// Children of a directory, or `None` when it is missing or not a directory.
async fn list_directory(
    repository: &Repository,
    directory: &Location,
) -> Result<Option<Vec<FileDetails>>> {
    if directory.is_root() || !directory_exists(repository.storage(), directory).await? {
        return Ok(None);
    }
    match repository.storage().get_files(directory).await {
        Ok(files) => Ok(Some(files)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Group and artifact id of an artifact directory.
fn coordinates(artifact_dir: &Location) -> (Option<String>, Option<String>) {
    let artifact_id = Some(artifact_dir.file_name().to_string()).filter(|id| !id.is_empty());
    let group_id = artifact_dir
        .parent()
        .filter(|group| !group.is_root())
        .map(|group| group.segments().collect::<Vec<_>>().join("."));
    (group_id, artifact_id)
}

async fn write_with_checksums(
    repository: &Repository,
    location: &Location,
    content: &Bytes,
) -> Result<()> {
    repository
        .storage()
        .put_file(location, stream_from_bytes(content.clone()))
        .await?;

    for checksum in ChecksumType::ALL {
        repository
            .storage()
            .put_file(
                &location.with_suffix(checksum.suffix())?,
                stream_from_bytes(checksum.compute(content)),
            )
            .await?;
    }
    Ok(())
}
