use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Method, Response};
use tokio_util::io::StreamReader;

use super::{MirrorHost, MirrorReference};
use crate::error::{Error, Result};
use crate::metadata::{GeneratedMetadata, MetadataService, parse_metadata};
use crate::repository::{Repository, RepositoryRegistry};
use crate::storage::{ContentStream, Document};
use crate::types::{DocumentInfo, FileDetails, Location};

/// Fetches files a repository does not hold from its mirror hosts.
///
/// Hosts are consulted in configuration order; the first that answers
/// wins. Failures are logged and the next host is tried.
pub struct MirrorResolver {
    registry: Arc<RepositoryRegistry>,
    metadata: Arc<MetadataService>,
}

impl MirrorResolver {
    pub fn new(registry: Arc<RepositoryRegistry>, metadata: Arc<MetadataService>) -> Self {
        Self { registry, metadata }
    }

    pub async fn find_details(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Result<FileDetails> {
        for host in candidates(repository, location) {
            match self.host_details(host, location).await {
                Ok(details) => return Ok(details),
                Err(e) => log_host_failure(host, repository, location, &e),
            }
        }
        Err(not_found(repository, location))
    }

    /// Fetches a file, persisting it locally when the answering host has
    /// `store` enabled.
    pub async fn find_file(&self, repository: &Repository, location: &Location) -> Result<Document> {
        for host in candidates(repository, location) {
            let document = match self.host_file(host, location).await {
                Ok(document) => document,
                Err(e) => {
                    log_host_failure(host, repository, location, &e);
                    continue;
                }
            };

            if !host.store {
                return Ok(document);
            }

            match self.store_locally(repository, location, document).await {
                Ok(document) => {
                    tracing::info!(
                        "Stored {location} in {} from mirror {}",
                        repository.name,
                        host.reference
                    );
                    return Ok(document);
                }
                Err(e) => tracing::warn!(
                    "Failed to store {location} from mirror {} in {}: {e}",
                    host.reference,
                    repository.name
                ),
            }
        }
        Err(not_found(repository, location))
    }

    /// Fetches the metadata document at `location` from the first host that
    /// has it. Never stored locally, the caller merges it with local
    /// metadata on every request.
    pub async fn find_metadata(
        &self,
        repository: &Repository,
        location: &Location,
    ) -> Option<GeneratedMetadata> {
        for host in candidates(repository, location) {
            match self.host_metadata(host, location).await {
                Ok(metadata) => return Some(metadata),
                Err(e) => log_host_failure(host, repository, location, &e),
            }
        }
        None
    }

    async fn host_metadata(&self, host: &MirrorHost, location: &Location) -> Result<GeneratedMetadata> {
        match &host.reference {
            MirrorReference::Loopback(name) => {
                let target = self.loopback(name)?;
                let metadata = self.metadata.find_metadata(&target, location).await?;
                Ok(metadata.as_ref().clone())
            }
            MirrorReference::Remote(_) => {
                let response = send(host, Method::GET, location).await?;
                let last_modified = document_info(location, &response)
                    .last_modified
                    .unwrap_or_else(Utc::now);
                let content = response.bytes().await.map_err(|e| {
                    Error::Internal(format!("reading {location} from {} failed: {e}", host.reference))
                })?;
                Ok(GeneratedMetadata {
                    metadata: parse_metadata(&content)?,
                    content,
                    last_modified,
                })
            }
        }
    }

    async fn store_locally(
        &self,
        repository: &Repository,
        location: &Location,
        document: Document,
    ) -> Result<Document> {
        repository
            .storage()
            .put_file(location, document.content)
            .await?;
        self.metadata.invalidate(&repository.name, location);
        repository.storage().get_file(location).await
    }

    async fn host_details(&self, host: &MirrorHost, location: &Location) -> Result<FileDetails> {
        match &host.reference {
            MirrorReference::Loopback(name) => {
                self.loopback(name)?
                    .storage()
                    .get_file_details(location)
                    .await
            }
            MirrorReference::Remote(_) => {
                let response = send(host, Method::HEAD, location).await?;
                Ok(FileDetails::Document(document_info(location, &response)))
            }
        }
    }

    async fn host_file(&self, host: &MirrorHost, location: &Location) -> Result<Document> {
        match &host.reference {
            MirrorReference::Loopback(name) => {
                self.loopback(name)?.storage().get_file(location).await
            }
            MirrorReference::Remote(_) => {
                let response = send(host, Method::GET, location).await?;
                let details = document_info(location, &response);
                let stream = response.bytes_stream().map_err(std::io::Error::other);
                let content: ContentStream = Box::pin(StreamReader::new(stream));
                Ok(Document { details, content })
            }
        }
    }

    fn loopback(&self, name: &str) -> Result<Arc<Repository>> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::not_found(format!("Mirrored repository {name} does not exist")))
    }
}

fn candidates<'a>(
    repository: &'a Repository,
    location: &'a Location,
) -> impl Iterator<Item = &'a MirrorHost> + 'a {
    repository
        .mirrors
        .iter()
        .filter(move |host| host.accepts(location))
}

fn log_host_failure(host: &MirrorHost, repository: &Repository, location: &Location, error: &Error) {
    if error.is_not_found() {
        tracing::debug!(
            "Mirror {} has no {location} for {}",
            host.reference,
            repository.name
        );
    } else {
        tracing::warn!(
            "Mirror {} failed to resolve {location} for {}: {error}",
            host.reference,
            repository.name
        );
    }
}

fn not_found(repository: &Repository, location: &Location) -> Error {
    Error::not_found(format!(
        "{} not found locally or remotely",
        location.route_path(&repository.name)
    ))
}

async fn send(host: &MirrorHost, method: Method, location: &Location) -> Result<Response> {
    let request = host
        .request(method, location)
        .ok_or_else(|| Error::Internal(format!("{} is not a remote mirror", host.reference)))?;

    let response = request
        .send()
        .await
        .map_err(|e| Error::Internal(format!("request to {} failed: {e}", host.reference)))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::not_found(format!("{location} not found")));
    }
    if !status.is_success() {
        return Err(Error::Internal(format!(
            "{} responded with {status}",
            host.reference
        )));
    }
    Ok(response)
}

fn document_info(location: &Location, response: &Response) -> DocumentInfo {
    let headers = response.headers();
    let content_length = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_default();

    let mut details = DocumentInfo::new(location.file_name(), content_length);
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        details.content_type = content_type.to_string();
    }
    details.last_modified = headers
        .get(LAST_MODIFIED)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        .map(|time| time.with_timezone(&Utc));
    details
}
