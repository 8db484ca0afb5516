use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::AppError;

/// Trait for blob storage operations.
///
/// Abstracted as a trait so handlers do not depend on where files live.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Store content under the given key, replacing any previous content.
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError>;

    /// Retrieve content by key. Returns `None` if the object doesn't exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError>;
}

/// Stores objects as files below a root directory.
pub struct LocalStorageClient {
    root: PathBuf,
}

impl LocalStorageClient {
    /// Create the root directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create storage directory '{}': {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path under the root, refusing anything that could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            let valid = !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
            if !valid {
                return Err(AppError::BadRequest(format!("Invalid object key '{key}'")));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageClient for LocalStorageClient {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to put object '{}': {}", key, e)))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to get object '{}': {}",
                key, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageClient::new(dir.path()).await.unwrap();

        storage
            .put_object("files/bill.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();

        let content = storage.get_object("files/bill.pdf").await.unwrap();
        assert_eq!(content.as_deref(), Some(b"%PDF-1.4".as_slice()));
        assert!(dir.path().join("files").join("bill.pdf").exists());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageClient::new(dir.path()).await.unwrap();
        assert!(storage.get_object("nothing.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorageClient::new(dir.path()).await.unwrap();

        for key in ["../secret", "a//b", "/etc/passwd", "a/./b", "sp ace.png"] {
            let result = storage.get_object(key).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))), "key {key}");
        }
    }
}
