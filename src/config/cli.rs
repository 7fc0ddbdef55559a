use crate::domain::ports::Storage;
use crate::utils::error::{PracticeError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-per-key storage rooted at the data directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(PracticeError::ValidationError {
                message: format!("invalid storage key: {:?}", key),
            });
        }
        Ok(self.base_path.join(key))
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        tokio::fs::create_dir_all(&self.base_path).await?;
        tokio::fs::write(&path, data).await?;
        tracing::trace!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    async fn remove_file(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_key_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert_eq!(storage.read_file("authToken").await.unwrap(), None);
        storage.remove_file("authToken").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_creates_data_dir() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested").join("data"));
        storage.write_file("user", b"{}").await.unwrap();
        assert_eq!(storage.read_file("user").await.unwrap(), Some(b"{}".to_vec()));

        storage.remove_file("user").await.unwrap();
        assert_eq!(storage.read_file("user").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        assert!(storage.write_file("../escape", b"x").await.is_err());
        assert!(storage.read_file("a/b").await.is_err());
        assert!(storage.read_file("").await.is_err());
    }
}
