//! The uniform file system contract every backend implements.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{Context, Error};

/// Shared handle to a constructed file system.
pub type FileSystemRef = Arc<dyn FileSystem>;

/// What kind of object a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

/// Result of [`FileSystem::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn file(size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: FileKind::File,
            size,
            modified,
        }
    }

    pub fn directory(modified: Option<DateTime<Utc>>) -> Self {
        Self {
            kind: FileKind::Directory,
            size: 0,
            modified,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

/// One entry of [`FileSystem::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Base name, no slashes.
    pub name: String,
    pub metadata: Metadata,
}

/// Uniform file system operations.
///
/// Paths are `/`-separated and relative to the backend's root; a leading
/// slash is accepted and ignored. Every operation takes the processing
/// context and must give up with [`Error::Cancelled`] or
/// [`Error::DeadlineExceeded`] once it is done.
///
/// # Object Safety
///
/// This trait is object-safe: backends are handed around as
/// [`FileSystemRef`].
#[async_trait]
pub trait FileSystem: Send + Sync + 'static {
    /// Short backend tag, e.g. `"local"` or `"s3"`.
    fn name(&self) -> &'static str;

    /// Metadata for `path`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if nothing exists at `path`.
    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error>;

    /// Read the whole file at `path`.
    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error>;

    /// Create or replace the file at `path`.
    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error>;

    /// List the directory at `path`, sorted by name.
    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error>;

    /// Create the directory at `path`.
    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error>;

    /// Remove the file or empty directory at `path`.
    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error>;

    /// Move `from` to `to`.
    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error>;

    /// Access the concrete backend.
    fn as_any(&self) -> &dyn Any;
}

/// Sort entries by name, the order `list` promises.
pub fn sort_entries(entries: &mut [DirEntry]) {
    entries.sort_by(|a, b| a.name.cmp(&b.name));
}
