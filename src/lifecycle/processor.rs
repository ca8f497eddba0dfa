use anyhow::Result;
use async_trait::async_trait;

/// Domain-specific post-processing of a raw run result
///
/// Returning `Some(artifact)` asks the lifecycle manager to write the artifact to
/// the run's output path. Returning `None` (or an empty artifact) keeps the raw
/// result inline on the run record instead.
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    async fn process(&self, raw_result: &str) -> Result<Option<String>>;
}

/// Writes the raw result unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl ResultProcessor for Passthrough {
    async fn process(&self, raw_result: &str) -> Result<Option<String>> {
        if raw_result.is_empty() {
            return Ok(None);
        }
        Ok(Some(raw_result.to_string()))
    }
}

/// Never produces an artifact; every result is kept inline
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineOnly;

#[async_trait]
impl ResultProcessor for InlineOnly {
    async fn process(&self, _raw_result: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_returns_raw() {
        let artifact = Passthrough.process("<xml/>").await.unwrap();
        assert_eq!(artifact.as_deref(), Some("<xml/>"));
    }

    #[tokio::test]
    async fn test_passthrough_empty_is_none() {
        assert!(Passthrough.process("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inline_only_never_produces_artifact() {
        assert!(InlineOnly.process("<xml/>").await.unwrap().is_none());
    }
}
