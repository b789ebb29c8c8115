//! S3-compatible object storage backend.
//!
//! Endpoints look like `s3://ACCESS_KEY:SECRET@host[:port]/bucket[/prefix]`.
//! The first path segment is the bucket; the rest is a key prefix every
//! operation is confined to. Requests are path-style and signed with AWS
//! Signature Version 4.
//!
//! Extras:
//!
//! - `region`: signing region, default `us-east-1`
//! - `insecure=true`: talk plain HTTP (local MinIO and friends)
//!
//! Construction validates the configuration only; nothing is sent until
//! the first operation.

mod config;
mod error;
mod fs;
pub mod sign;
mod xml;

use std::sync::Arc;

use async_trait::async_trait;
use unifs_core::{BackendFactory, Context, Endpoint, Error, FileSystemRef};

pub use config::{S3Config, DEFAULT_REGION};
pub use error::S3Error;
pub use fs::S3FileSystem;

/// Factory for `s3` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct S3Backend;

#[async_trait]
impl BackendFactory for S3Backend {
    async fn create(&self, _ctx: &Context, endpoint: &Endpoint) -> Result<FileSystemRef, Error> {
        let config = S3Config::from_endpoint(endpoint)?;
        tracing::debug!(
            endpoint = %config.endpoint_url,
            bucket = %config.bucket,
            prefix = %config.prefix,
            "creating s3 file system"
        );
        Ok(Arc::new(S3FileSystem::new(config)?))
    }
}
