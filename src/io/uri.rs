use std::fmt;
use std::path::PathBuf;
use url::Url;

use crate::config::{LOCAL_FILE_PREFIX, S3_URI_PREFIX};
use crate::error::{AdapterError, Result};

/// Represents a resolved artifact location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPath {
    Local(PathBuf),
    Object { bucket: String, key: String },
}

impl ArtifactPath {
    /// Resolve a path for the local-file backend
    ///
    /// Only `file://<path>` is recognized; the remainder after the prefix is used
    /// verbatim as the filesystem path.
    pub fn parse_local(path: &str) -> Result<Self> {
        let file_path = path
            .strip_prefix(LOCAL_FILE_PREFIX)
            .ok_or_else(|| AdapterError::UnsupportedPathScheme {
                path: path.to_string(),
                backend: "local-file",
            })?;

        if file_path.is_empty() {
            return Err(AdapterError::InvalidPath {
                path: path.to_string(),
                message: "missing file name",
            });
        }

        Ok(ArtifactPath::Local(PathBuf::from(file_path)))
    }

    /// Resolve a path for the object-store backend
    ///
    /// Accepts `<bucket>/<key>` where the first segment names the bucket, and the
    /// equivalent `s3://<bucket>/<key>` form.
    pub fn parse_object(path: &str) -> Result<Self> {
        if path.starts_with(S3_URI_PREFIX) {
            return Self::parse_s3_url(path);
        }

        if path.contains("://") {
            return Err(AdapterError::UnsupportedPathScheme {
                path: path.to_string(),
                backend: "object-store",
            });
        }

        let (bucket, key) = path
            .split_once('/')
            .ok_or_else(|| AdapterError::InvalidPath {
                path: path.to_string(),
                message: "expected <bucket>/<key>",
            })?;

        Self::object(path, bucket, key)
    }

    fn parse_s3_url(path: &str) -> Result<Self> {
        let url = Url::parse(path).map_err(|_| AdapterError::InvalidPath {
            path: path.to_string(),
            message: "malformed s3:// URI",
        })?;

        let bucket = url.host_str().unwrap_or_default();
        // Remove leading '/' from path
        let key = url.path().trim_start_matches('/');

        Self::object(path, bucket, key)
    }

    fn object(path: &str, bucket: &str, key: &str) -> Result<Self> {
        if bucket.is_empty() {
            return Err(AdapterError::InvalidPath {
                path: path.to_string(),
                message: "missing bucket",
            });
        }
        if key.is_empty() {
            return Err(AdapterError::InvalidPath {
                path: path.to_string(),
                message: "missing key",
            });
        }

        Ok(ArtifactPath::Object {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactPath::Local(path) => write!(f, "{}{}", LOCAL_FILE_PREFIX, path.display()),
            ArtifactPath::Object { bucket, key } => write!(f, "{}/{}", bucket, key),
        }
    }
}
