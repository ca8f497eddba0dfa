use async_trait::async_trait;
use bytes::Bytes;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info};

use super::sink::StorageSink;
use super::uri::ArtifactPath;
use crate::error::{AdapterError, Result};

/// StorageSink implementation for local files addressed as `file://<path>`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSink;

impl LocalFileSink {
    pub fn new() -> Self {
        Self
    }

    fn resolve(path: &str) -> Result<PathBuf> {
        match ArtifactPath::parse_local(path)? {
            ArtifactPath::Local(file_path) => Ok(file_path),
            ArtifactPath::Object { .. } => Err(AdapterError::UnsupportedPathScheme {
                path: path.to_string(),
                backend: "local-file",
            }),
        }
    }
}

#[async_trait]
impl StorageSink for LocalFileSink {
    fn backend(&self) -> &'static str {
        "local-file"
    }

    async fn store(&self, path: &str, content: Bytes) -> Result<()> {
        let target = Self::resolve(path)?;

        // The temp file must live next to the target so the rename stays on one filesystem
        let dir = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AdapterError::storage("create directory for", path, e))?;

        info!("Writing result to disk: {}", target.display());
        let len = content.len();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&content)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| AdapterError::storage("write", path, e))?
        .map_err(|e| AdapterError::storage("write", path, e))?;

        debug!("Wrote {} bytes to {}", len, path);
        Ok(())
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>> {
        let file_path = Self::resolve(path)?;

        fs::read(&file_path)
            .await
            .map_err(|e| AdapterError::retrieval(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_uri(dir: &TempDir, name: &str) -> String {
        format!("file://{}", dir.path().join(name).display())
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new();
        let path = file_uri(&dir, "out.esdl");

        sink.store(&path, Bytes::from_static(b"<xml/>")).await.unwrap();

        let content = std::fs::read_to_string(dir.path().join("out.esdl")).unwrap();
        assert_eq!(content, "<xml/>");
        assert_eq!(sink.load(&path).await.unwrap(), b"<xml/>");
    }

    #[tokio::test]
    async fn test_store_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new();
        let path = file_uri(&dir, "nested/deeper/out.esdl");

        sink.store(&path, Bytes::from_static(b"data")).await.unwrap();

        assert!(dir.path().join("nested/deeper/out.esdl").exists());
    }

    #[tokio::test]
    async fn test_store_replaces_existing_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new();
        let path = file_uri(&dir, "out.esdl");

        sink.store(&path, Bytes::from_static(b"first version, longer"))
            .await
            .unwrap();
        sink.store(&path, Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(sink.load(&path).await.unwrap(), b"second");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temporary files must not remain");
    }

    #[tokio::test]
    async fn test_store_rejects_non_file_scheme() {
        let sink = LocalFileSink::new();

        let result = sink
            .store("bucket/out.esdl", Bytes::from_static(b"data"))
            .await;
        assert!(matches!(
            result,
            Err(AdapterError::UnsupportedPathScheme { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_retrieval_error() {
        let dir = TempDir::new().unwrap();
        let sink = LocalFileSink::new();

        let result = sink.load(&file_uri(&dir, "missing.esdl")).await;
        assert!(matches!(result, Err(AdapterError::Retrieval { .. })));
    }
}
