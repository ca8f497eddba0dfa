use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Abstraction for artifact persistence
/// This trait enables writing and reading run artifacts on different backends
/// (local files, S3-compatible object storage) through one logical path format
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Short backend name used in logs and error messages
    fn backend(&self) -> &'static str;

    /// Write `content` so that it is later retrievable by the same `path`
    /// Partial writes must never be visible under the target path
    async fn store(&self, path: &str, content: Bytes) -> Result<()>;

    /// Read the artifact stored under `path`
    async fn load(&self, path: &str) -> Result<Vec<u8>>;
}

/// Load several artifacts in order, failing on the first missing one
pub async fn load_all(sink: &dyn StorageSink, paths: &[&str]) -> Result<Vec<Vec<u8>>> {
    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        contents.push(sink.load(path).await?);
    }
    Ok(contents)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::AdapterError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory sink for tests
    #[derive(Default)]
    pub struct MemorySink {
        pub objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MemorySink {
        pub fn with_object(path: &str, content: &[u8]) -> Self {
            let sink = Self::default();
            sink.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), content.to_vec());
            sink
        }

        pub fn get(&self, path: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(path).cloned()
        }
    }

    #[async_trait]
    impl StorageSink for MemorySink {
        fn backend(&self) -> &'static str {
            "memory"
        }

        async fn store(&self, path: &str, content: Bytes) -> Result<()> {
            self.objects
                .lock()
                .unwrap()
                .insert(path.to_string(), content.to_vec());
            Ok(())
        }

        async fn load(&self, path: &str) -> Result<Vec<u8>> {
            self.get(path).ok_or_else(|| {
                AdapterError::retrieval(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such object"),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use crate::error::AdapterError;

    #[tokio::test]
    async fn test_load_all_preserves_order() {
        let sink = MemorySink::with_object("b/one", b"1");
        sink.store("b/two", Bytes::from_static(b"2")).await.unwrap();

        let contents = load_all(&sink, &["b/two", "b/one"]).await.unwrap();
        assert_eq!(contents, vec![b"2".to_vec(), b"1".to_vec()]);
    }

    #[tokio::test]
    async fn test_load_all_fails_on_missing() {
        let sink = MemorySink::with_object("b/one", b"1");

        let result = load_all(&sink, &["b/one", "b/missing"]).await;
        assert!(matches!(result, Err(AdapterError::Retrieval { .. })));
    }
}
