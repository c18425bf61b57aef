use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

use super::{ContentStream, Document, Quota, StorageProvider};
use crate::error::{Error, Result};
use crate::types::{DirectoryInfo, DocumentInfo, FileDetails, Location};
use crate::version::compare_files;

/// Directory under the root that holds in-flight writes.
const STAGING_DIR: &str = ".staging";

fn from_io(e: std::io::Error, location: &Location) -> Error {
    if e.kind() == ErrorKind::NotFound {
        Error::not_found(format!("File not found: {location}"))
    } else {
        Error::Io(e)
    }
}

/// Stores a repository as a plain directory tree.
pub struct FileSystemStorageProvider {
    root: PathBuf,
    quota: Quota,
}

impl FileSystemStorageProvider {
    pub async fn new(root: impl Into<PathBuf>, quota: Quota) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, quota })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn quota(&self) -> Quota {
        self.quota
    }

    fn path_for(&self, location: &Location) -> Result<PathBuf> {
        if location.segments().next() == Some(STAGING_DIR) {
            return Err(Error::bad_request(format!(
                "Path is reserved: {location}"
            )));
        }
        if location.is_root() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(location.as_str()))
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(Uuid::new_v4().to_string())
    }

    async fn device_capacity(&self) -> Result<u64> {
        let root = self.root.clone();
        let capacity = tokio::task::spawn_blocking(move || fs4::total_space(&root))
            .await
            .map_err(|e| Error::Internal(format!("capacity lookup failed: {e}")))??;
        Ok(capacity)
    }

    async fn stage(&self, staging: &Path, mut content: ContentStream) -> Result<u64> {
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(staging).await?;
        let size = tokio::io::copy(&mut content, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        Ok(size)
    }

    async fn commit(&self, location: &Location, staging: &Path, target: &Path) -> Result<()> {
        let size = fs::metadata(staging).await?.len();

        if !self.can_hold(size).await? {
            return Err(Error::InsufficientStorage(format!(
                "Not enough space to store {location} ({size} bytes)"
            )));
        }

        if fs::metadata(target).await.is_ok_and(|m| m.is_dir()) {
            return Err(Error::conflict(format!("{location} is a directory")));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(staging, target).await?;

        Ok(())
    }

    /// Removes empty directories between `path` and the root.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    async fn walk_usage(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await? {
                if dir == self.root && entry.file_name() == STAGING_DIR {
                    continue;
                }
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total = total.saturating_add(metadata.len());
                }
            }
        }

        Ok(total)
    }
}

fn document_info(name: &str, metadata: &std::fs::Metadata) -> DocumentInfo {
    let mut info = DocumentInfo::new(name, metadata.len());
    info.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    info
}

fn shallow_details(name: &str, metadata: &std::fs::Metadata) -> FileDetails {
    if metadata.is_dir() {
        FileDetails::Directory(DirectoryInfo {
            name: name.to_string(),
            files: Vec::new(),
        })
    } else {
        FileDetails::Document(document_info(name, metadata))
    }
}

#[async_trait]
impl StorageProvider for FileSystemStorageProvider {
    async fn put_file(&self, location: &Location, content: ContentStream) -> Result<()> {
        let target = self.path_for(location)?;
        if location.is_root() {
            return Err(Error::bad_request("Cannot write to the repository root"));
        }

        let staging = self.staging_path();
        let result = match self.stage(&staging, content).await {
            Ok(_) => self.commit(location, &staging, &target).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }

        result
    }

    async fn get_file(&self, location: &Location) -> Result<Document> {
        let path = self.path_for(location)?;
        let file = File::open(&path)
            .await
            .map_err(|e| from_io(e, location))?;

        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(Error::bad_request(format!("{location} is a directory")));
        }

        Ok(Document {
            details: document_info(location.file_name(), &metadata),
            content: Box::pin(BufReader::new(file)),
        })
    }

    async fn get_file_details(&self, location: &Location) -> Result<FileDetails> {
        let path = self.path_for(location)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| from_io(e, location))?;

        if metadata.is_dir() {
            return Ok(FileDetails::Directory(DirectoryInfo {
                name: location.file_name().to_string(),
                files: self.get_files(location).await?,
            }));
        }

        Ok(FileDetails::Document(document_info(
            location.file_name(),
            &metadata,
        )))
    }

    async fn get_files(&self, directory: &Location) -> Result<Vec<FileDetails>> {
        let path = self.path_for(directory)?;
        let mut entries = fs::read_dir(&path)
            .await
            .map_err(|e| from_io(e, directory))?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if directory.is_root() && name == STAGING_DIR {
                continue;
            }
            let metadata = entry.metadata().await?;
            files.push(shallow_details(&name, &metadata));
        }

        files.sort_by(compare_files);
        Ok(files)
    }

    async fn get_last_modified_time(&self, location: &Location) -> Result<DateTime<Utc>> {
        let path = self.path_for(location)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| from_io(e, location))?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }

    async fn get_file_size(&self, location: &Location) -> Result<u64> {
        let path = self.path_for(location)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| from_io(e, location))?;
        Ok(metadata.len())
    }

    async fn remove_file(&self, location: &Location) -> Result<()> {
        if location.is_root() {
            return Err(Error::bad_request("Cannot remove the repository root"));
        }

        let path = self.path_for(location)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| from_io(e, location))?;

        if metadata.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            fs::remove_file(&path)
                .await
                .map_err(|e| from_io(e, location))?;
        }

        self.prune_empty_parents(&path).await;
        Ok(())
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        let path = self.path_for(location)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn is_directory(&self, location: &Location) -> Result<bool> {
        let path = self.path_for(location)?;
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| from_io(e, location))?;
        Ok(metadata.is_dir())
    }

    async fn usage(&self) -> Result<u64> {
        self.walk_usage().await
    }

    async fn can_hold(&self, size: u64) -> Result<bool> {
        if self.quota == Quota::Unlimited {
            return Ok(true);
        }

        let usage = self.usage().await?;
        let capacity = if self.quota.needs_device_capacity() {
            self.device_capacity().await?
        } else {
            0
        };

        Ok(self.quota.permits(usage, size, capacity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{read_to_bytes, stream_from_bytes};
    use tempfile::TempDir;

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    async fn provider(temp_dir: &TempDir, quota: Quota) -> FileSystemStorageProvider {
        FileSystemStorageProvider::new(temp_dir.path().join("releases"), quota)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;
        let location = loc("com/example/lib/1.0/lib-1.0.jar");

        storage
            .put_file(&location, stream_from_bytes(&b"jar-bytes"[..]))
            .await
            .unwrap();

        assert!(storage.exists(&location).await.unwrap());
        assert_eq!(storage.get_file_size(&location).await.unwrap(), 9);

        let document = storage.get_file(&location).await.unwrap();
        assert_eq!(document.details.name, "lib-1.0.jar");
        assert_eq!(document.details.content_type, "application/java-archive");
        assert_eq!(
            read_to_bytes(document.content).await.unwrap().as_ref(),
            b"jar-bytes"
        );
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;
        let location = loc("a/b.txt");

        storage
            .put_file(&location, stream_from_bytes(&b"first version"[..]))
            .await
            .unwrap();
        storage
            .put_file(&location, stream_from_bytes(&b"second"[..]))
            .await
            .unwrap();

        let content = storage.get_file(&location).await.unwrap().into_bytes().await;
        assert_eq!(content.unwrap().as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_fixed_quota() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Fixed { max_bytes: 100 }).await;
        let first = loc("a/first.bin");
        let second = loc("a/second.bin");

        storage
            .put_file(&first, stream_from_bytes(vec![1u8; 60]))
            .await
            .unwrap();

        let result = storage
            .put_file(&second, stream_from_bytes(vec![2u8; 60]))
            .await;
        assert!(matches!(result, Err(Error::InsufficientStorage(_))));
        assert!(!storage.exists(&second).await.unwrap());

        storage.remove_file(&first).await.unwrap();
        storage
            .put_file(&second, stream_from_bytes(vec![2u8; 60]))
            .await
            .unwrap();
        assert_eq!(storage.usage().await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Fixed { max_bytes: 100 }).await;
        let location = loc("a/file.bin");

        storage
            .put_file(&location, stream_from_bytes(vec![1u8; 50]))
            .await
            .unwrap();
        let result = storage
            .put_file(&location, stream_from_bytes(vec![2u8; 80]))
            .await;
        assert!(matches!(result, Err(Error::InsufficientStorage(_))));

        let content = storage.get_file(&location).await.unwrap().into_bytes().await;
        assert_eq!(content.unwrap().as_ref(), vec![1u8; 50].as_slice());
        assert_eq!(storage.usage().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;
        let location = loc("missing/file.jar");

        assert!(!storage.exists(&location).await.unwrap());
        assert!(matches!(
            storage.get_file(&location).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            storage.get_file_details(&location).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            storage.remove_file(&location).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            storage.get_last_modified_time(&location).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            storage.is_directory(&location).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_hides_staging() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;

        for path in [
            "lib/1.10.0/lib.jar",
            "lib/1.2.0/lib.jar",
            "lib/1.0.0/lib.jar",
            "lib/maven-metadata.xml",
        ] {
            storage
                .put_file(&loc(path), stream_from_bytes(&b"x"[..]))
                .await
                .unwrap();
        }
        fs::create_dir_all(storage.root().join(STAGING_DIR))
            .await
            .unwrap();

        let names: Vec<String> = storage
            .get_files(&loc("lib"))
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["1.0.0", "1.2.0", "1.10.0", "maven-metadata.xml"]);

        let root: Vec<String> = storage
            .get_files(&Location::root())
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(root, vec!["lib"]);
    }

    #[tokio::test]
    async fn test_directory_details() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;
        storage
            .put_file(&loc("g/a/1.0/a-1.0.pom"), stream_from_bytes(&b"<project/>"[..]))
            .await
            .unwrap();

        assert!(storage.is_directory(&loc("g/a")).await.unwrap());
        match storage.get_file_details(&loc("g/a/1.0")).await.unwrap() {
            FileDetails::Directory(dir) => {
                assert_eq!(dir.name, "1.0");
                assert_eq!(dir.files.len(), 1);
                assert_eq!(dir.files[0].name(), "a-1.0.pom");
            }
            other => panic!("expected directory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_directories() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;
        let location = loc("g/a/1.0/a-1.0.jar");

        storage
            .put_file(&location, stream_from_bytes(&b"x"[..]))
            .await
            .unwrap();
        storage.remove_file(&location).await.unwrap();

        assert!(!storage.exists(&loc("g")).await.unwrap());
        assert!(storage.root().exists());
    }

    #[tokio::test]
    async fn test_staging_is_reserved() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Unlimited).await;

        let result = storage
            .put_file(&loc(".staging/x"), stream_from_bytes(&b"x"[..]))
            .await;
        assert!(matches!(result, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_percentage_quota_allows_small_files() {
        let temp_dir = TempDir::new().unwrap();
        let storage = provider(&temp_dir, Quota::Percentage { max_fraction: 1.0 }).await;

        assert!(storage.can_hold(1).await.unwrap());
    }
}
