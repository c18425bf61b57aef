//! Filesystem storage that tests can pause or break on demand.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use super::{ContentStream, Document, FileSystemStorageProvider, Quota, StorageProvider};
use crate::error::{Error, Result};
use crate::types::{FileDetails, Location};

pub(crate) struct GatedStorage {
    inner: FileSystemStorageProvider,
    paused_file: Mutex<Option<String>>,
    entered: Notify,
    released: Notify,
    broken_directories: AtomicBool,
}

impl GatedStorage {
    pub(crate) async fn new(root: &Path) -> Self {
        Self {
            inner: FileSystemStorageProvider::new(root, Quota::Unlimited)
                .await
                .unwrap(),
            paused_file: Mutex::new(None),
            entered: Notify::new(),
            released: Notify::new(),
            broken_directories: AtomicBool::new(false),
        }
    }

    /// The next `put_file` of a file called `name` blocks until `release`.
    pub(crate) fn pause_next_put(&self, name: &str) {
        *self.paused_file.lock().unwrap() = Some(name.to_string());
    }

    pub(crate) async fn wait_until_paused(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self) {
        self.released.notify_one();
    }

    /// Makes every `is_directory` call fail with an I/O error.
    pub(crate) fn break_directory_checks(&self) {
        self.broken_directories.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageProvider for GatedStorage {
    async fn put_file(&self, location: &Location, content: ContentStream) -> Result<()> {
        let pause = {
            let mut paused = self.paused_file.lock().unwrap();
            if paused.as_deref() == Some(location.file_name()) {
                paused.take();
                true
            } else {
                false
            }
        };
        if pause {
            self.entered.notify_one();
            self.released.notified().await;
        }
        self.inner.put_file(location, content).await
    }

    async fn get_file(&self, location: &Location) -> Result<Document> {
        self.inner.get_file(location).await
    }

    async fn get_file_details(&self, location: &Location) -> Result<FileDetails> {
        self.inner.get_file_details(location).await
    }

    async fn get_files(&self, directory: &Location) -> Result<Vec<FileDetails>> {
        self.inner.get_files(directory).await
    }

    async fn get_last_modified_time(&self, location: &Location) -> Result<DateTime<Utc>> {
        self.inner.get_last_modified_time(location).await
    }

    async fn get_file_size(&self, location: &Location) -> Result<u64> {
        self.inner.get_file_size(location).await
    }

    async fn remove_file(&self, location: &Location) -> Result<()> {
        self.inner.remove_file(location).await
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        self.inner.exists(location).await
    }

    async fn is_directory(&self, location: &Location) -> Result<bool> {
        if self.broken_directories.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.is_directory(location).await
    }

    async fn usage(&self) -> Result<u64> {
        self.inner.usage().await
    }

    async fn can_hold(&self, size: u64) -> Result<bool> {
        self.inner.can_hold(size).await
    }
}
