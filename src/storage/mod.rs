//! Storage providers.

mod filesystem;
mod quota;
#[cfg(test)]
pub(crate) mod gated;

pub use filesystem::FileSystemStorageProvider;
pub use quota::Quota;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::Result;
use crate::types::{DocumentInfo, FileDetails, Location};

/// Byte stream handed in and out of storage.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

/// Wraps in-memory bytes as a content stream.
#[must_use]
pub fn stream_from_bytes(data: impl Into<Bytes>) -> ContentStream {
    Box::pin(std::io::Cursor::new(data.into()))
}

/// Drains a content stream into memory.
pub async fn read_to_bytes(mut stream: ContentStream) -> Result<Bytes> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).await?;
    Ok(Bytes::from(buffer))
}

/// `is_directory` that reads a missing target as `false`.
pub async fn directory_exists(storage: &dyn StorageProvider, location: &Location) -> Result<bool> {
    match storage.is_directory(location).await {
        Err(e) if e.is_not_found() => Ok(false),
        result => result,
    }
}

/// A readable file together with its details.
pub struct Document {
    pub details: DocumentInfo,
    pub content: ContentStream,
}

impl Document {
    pub async fn into_bytes(self) -> Result<Bytes> {
        read_to_bytes(self.content).await
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("details", &self.details)
            .finish_non_exhaustive()
    }
}

/// Durable storage for one repository.
///
/// Every accessor except `exists` fails with `NotFound` when the target is
/// absent.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Stores content atomically, failing with `InsufficientStorage` when
    /// the quota cannot hold it.
    async fn put_file(&self, location: &Location, content: ContentStream) -> Result<()>;

    async fn get_file(&self, location: &Location) -> Result<Document>;

    async fn get_file_details(&self, location: &Location) -> Result<FileDetails>;

    /// Lists the immediate children of a directory, sorted.
    async fn get_files(&self, directory: &Location) -> Result<Vec<FileDetails>>;

    async fn get_last_modified_time(&self, location: &Location) -> Result<DateTime<Utc>>;

    async fn get_file_size(&self, location: &Location) -> Result<u64>;

    async fn remove_file(&self, location: &Location) -> Result<()>;

    async fn exists(&self, location: &Location) -> Result<bool>;

    async fn is_directory(&self, location: &Location) -> Result<bool>;

    /// Total bytes stored.
    async fn usage(&self) -> Result<u64>;

    async fn can_hold(&self, size: u64) -> Result<bool>;
}
