use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Repository, RepositoryRegistry};
use crate::checksum::ChecksumType;
use crate::error::Result;
use crate::events::{DeployEvent, EventListener};
use crate::metadata::{
    Metadata, MetadataService, SnapshotVersion, is_metadata_file, is_snapshot_version,
    parse_metadata, snapshot_file_name,
};
use crate::types::Location;
use crate::version::compare_versions;

/// Prunes old snapshot builds once a client deploys snapshot metadata.
///
/// Keeps the newest `preserved` builds of the version, deletes the files of
/// the others and rewrites the metadata to match.
pub struct PreservedBuildsListener {
    registry: Arc<RepositoryRegistry>,
    metadata: Arc<MetadataService>,
}

impl PreservedBuildsListener {
    pub fn new(registry: Arc<RepositoryRegistry>, metadata: Arc<MetadataService>) -> Self {
        Self { registry, metadata }
    }

    async fn prune(&self, repository: &Repository, location: &Location, keep: usize) -> anyhow::Result<()> {
        let Some(version_dir) = location.parent() else {
            return Ok(());
        };

        let content = repository.storage().get_file(location).await?.into_bytes().await?;
        let mut metadata = parse_metadata(&content)?;

        let removed = retain_newest_builds(&mut metadata, keep);
        if removed.is_empty() {
            return Ok(());
        }

        let artifact_id = match &metadata.artifact_id {
            Some(artifact_id) => artifact_id.clone(),
            None => version_dir
                .parent()
                .map(|dir| dir.file_name().to_string())
                .unwrap_or_default(),
        };

        let mut deleted = 0;
        for entry in &removed {
            let file = version_dir.resolve(&snapshot_file_name(&artifact_id, entry))?;
            for target in build_files(&file)? {
                if repository.storage().exists(&target).await? {
                    repository.storage().remove_file(&target).await?;
                    deleted += 1;
                }
            }
        }

        self.metadata.invalidate(&repository.name, location);
        self.metadata
            .store_metadata(repository, location, metadata)
            .await?;

        tracing::info!(
            "Removed {deleted} files of outdated builds in {}/{version_dir}",
            repository.name
        );
        Ok(())
    }
}

#[async_trait]
impl EventListener<DeployEvent> for PreservedBuildsListener {
    fn name(&self) -> &str {
        "preserved-builds"
    }

    async fn on_event(&self, event: &DeployEvent) -> anyhow::Result<()> {
        if !is_metadata_file(&event.location) {
            return Ok(());
        }
        let is_snapshot_dir = event
            .location
            .parent()
            .is_some_and(|dir| is_snapshot_version(dir.file_name()));
        if !is_snapshot_dir {
            return Ok(());
        }

        let Some(repository) = self.registry.get(&event.repository) else {
            return Ok(());
        };
        let Some(keep) = repository.preserved_builds() else {
            return Ok(());
        };

        self.prune(&repository, &event.location, keep).await
    }
}

/// A build file with its signature and the checksums of both.
fn build_files(file: &Location) -> Result<Vec<Location>> {
    let signature = file.with_suffix(".asc")?;
    let mut files = Vec::new();
    for base in [file.clone(), signature] {
        for checksum in ChecksumType::ALL {
            files.push(base.with_suffix(checksum.suffix())?);
        }
        files.push(base);
    }
    Ok(files)
}

/// Drops every snapshot entry outside the `keep` newest build values.
/// Returns the removed entries.
fn retain_newest_builds(metadata: &mut Metadata, keep: usize) -> Vec<SnapshotVersion> {
    let Some(snapshot_versions) = metadata
        .versioning
        .as_mut()
        .and_then(|versioning| versioning.snapshot_versions.as_mut())
    else {
        return Vec::new();
    };

    let mut newest_update: HashMap<&str, &str> = HashMap::new();
    for entry in &snapshot_versions.entries {
        let updated = newest_update.entry(entry.value.as_str()).or_default();
        if entry.updated.as_str() > *updated {
            *updated = entry.updated.as_str();
        }
    }

    let mut builds: Vec<(&str, &str)> = newest_update.into_iter().collect();
    builds.sort_by(|(a_value, a_updated), (b_value, b_updated)| {
        match b_updated.cmp(a_updated) {
            Ordering::Equal => compare_versions(b_value, a_value),
            other => other,
        }
    });

    let kept: HashSet<String> = builds
        .into_iter()
        .take(keep)
        .map(|(value, _)| value.to_string())
        .collect();

    let (retained, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut snapshot_versions.entries)
        .into_iter()
        .partition(|entry| kept.contains(&entry.value));
    snapshot_versions.entries = retained;
    removed
}
