//! Configuration constants for the model run adapter
//!
//! This module centralizes all tunable parameters and constants used throughout
//! the crate.

use std::time::Duration;

// ============================================================================
// Lifecycle Configuration
// ============================================================================

/// Upper bound on a single completion poll issued by `status`
///
/// Set to 30 seconds because the external job collaborator is expected to answer
/// status queries quickly. A probe that does not answer within this window leaves
/// the run in its current state and the caller is told to poll again.
pub const STATUS_POLL_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Storage Configuration
// ============================================================================

/// Prefix that marks a local filesystem target
pub const LOCAL_FILE_PREFIX: &str = "file://";

/// Optional prefix accepted in front of `<bucket>/<key>` object paths
pub const S3_URI_PREFIX: &str = "s3://";

/// Region used for S3-compatible endpoints that ignore regions (e.g. MinIO)
pub const DEFAULT_REGION: &str = "us-east-1";
