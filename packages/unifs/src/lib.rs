//! unifs: one file system capability over local disk, S3, FTP/FTPS and
//! WebDAV, selected by an endpoint address.
//!
//! A [`FileSystemBackend`] holds an [`Endpoint`] and optional overrides.
//! [`init`](FileSystemBackend::init) applies the overrides, picks the
//! backend by scheme and stores the resulting [`FileSystemRef`], which can
//! then be published on a [`Context`] for downstream code.
//!
//! # Example
//!
//! ```rust,ignore
//! use unifs::{Context, FileSystemBackend};
//!
//! async fn mount(config: &str) -> Result<Context, unifs::Error> {
//!     let mut backend: FileSystemBackend = serde_json::from_str(config).unwrap();
//!     let ctx = Context::background();
//!     backend.init(&ctx).await?;
//!     Ok(backend.inject_context(&ctx))
//! }
//! ```
//!
//! ## Crates
//!
//! - `unifs-core`: endpoints, the `FileSystem` trait, contexts, the registry
//! - `unifs-local`: `file://`
//! - `unifs-s3`: `s3://`
//! - `unifs-ftp`: `ftp://` and `ftps://`
//! - `unifs-webdav`: `webdav://`

mod backend;
mod resolve;

pub use backend::FileSystemBackend;
pub use resolve::{resolve, Overrides};

pub use unifs_core::{
    inject, path, retrieve, BackendFactory, BackendRegistry, Bytes, CancelHandle, Context,
    DirEntry, Endpoint, Error, FileKind, FileSystem, FileSystemRef, Metadata,
};

pub use unifs_ftp as ftp;
pub use unifs_local as local;
pub use unifs_s3 as s3;
pub use unifs_webdav as webdav;

/// Registry with the built-in schemes: `s3`, `ftp`, `ftps`, `webdav` and
/// `file`.
pub fn default_registry() -> BackendRegistry {
    BackendRegistry::new()
        .with("s3", s3::S3Backend)
        .with("ftp", ftp::FtpBackend)
        .with("ftps", ftp::FtpBackend)
        .with("webdav", webdav::WebDavBackend)
        .with("file", local::LocalBackend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schemes() {
        let schemes: Vec<_> = default_registry().schemes().map(str::to_string).collect();
        assert_eq!(schemes, vec!["file", "ftp", "ftps", "s3", "webdav"]);
    }
}
