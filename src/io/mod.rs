//! Storage abstraction layer for writing and reading run artifacts

pub mod local_sink;
pub mod s3_sink;
pub mod sink;
pub mod uri;

pub use local_sink::LocalFileSink;
pub use s3_sink::S3Sink;
pub use sink::{StorageSink, load_all};
pub use uri::ArtifactPath;
