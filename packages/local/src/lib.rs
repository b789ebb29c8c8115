//! Local disk backend.
//!
//! Endpoints use the `file` scheme. `file:///var/data` is rooted at the
//! absolute path `/var/data`; `file://./data` (hostname `.`) is rooted at
//! `data`, relative to the working directory.

use std::any::Any;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use unifs_core::path::clean;
use unifs_core::{
    sort_entries, BackendFactory, Context, DirEntry, Endpoint, Error, FileSystem, FileSystemRef,
    Metadata,
};

/// Root directory a `file` endpoint addresses.
///
/// With hostname `.` and a path starting with `/`, exactly one leading `/`
/// is removed so the root is relative to the working directory. Every
/// other endpoint keeps its path verbatim.
pub fn local_root(endpoint: &Endpoint) -> PathBuf {
    match endpoint.path.strip_prefix('/') {
        Some(relative) if endpoint.hostname == "." => PathBuf::from(relative),
        _ => PathBuf::from(&endpoint.path),
    }
}

/// File system rooted at a local directory.
///
/// Construction touches nothing on disk; a missing root surfaces as
/// [`Error::NotFound`] on first use.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// An empty root means the working directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root
        };
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf), Error> {
        let cleaned = clean(path)?;
        let full = if cleaned.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&cleaned)
        };
        Ok((cleaned, full))
    }
}

fn map_io(path: &str, error: io::Error) -> Error {
    match error.kind() {
        io::ErrorKind::NotFound => Error::NotFound {
            path: path.to_string(),
        },
        _ => Error::Io(error),
    }
}

fn to_metadata(meta: &std::fs::Metadata) -> Metadata {
    let modified = meta.modified().ok().map(DateTime::<Utc>::from);
    if meta.is_dir() {
        Metadata::directory(modified)
    } else {
        Metadata::file(meta.len(), modified)
    }
}

async fn ensure_parent(full: &Path) -> Result<(), Error> {
    if let Some(parent) = full.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error> {
        let (cleaned, full) = self.resolve(path)?;
        ctx.run(async {
            let meta = tokio::fs::metadata(&full)
                .await
                .map_err(|e| map_io(&cleaned, e))?;
            Ok::<_, Error>(to_metadata(&meta))
        })
        .await
    }

    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error> {
        let (cleaned, full) = self.resolve(path)?;
        tracing::debug!(path = %full.display(), "reading");
        ctx.run(async {
            let data = tokio::fs::read(&full)
                .await
                .map_err(|e| map_io(&cleaned, e))?;
            Ok::<_, Error>(Bytes::from(data))
        })
        .await
    }

    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error> {
        let (_, full) = self.resolve(path)?;
        tracing::debug!(path = %full.display(), size = data.len(), "writing");
        ctx.run(async {
            ensure_parent(&full).await?;
            tokio::fs::write(&full, &data).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error> {
        let (cleaned, full) = self.resolve(path)?;
        ctx.run(async {
            let mut dir = tokio::fs::read_dir(&full)
                .await
                .map_err(|e| map_io(&cleaned, e))?;

            let mut entries = Vec::new();
            while let Some(entry) = dir.next_entry().await? {
                let meta = entry.metadata().await?;
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    metadata: to_metadata(&meta),
                });
            }
            sort_entries(&mut entries);
            Ok::<_, Error>(entries)
        })
        .await
    }

    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (_, full) = self.resolve(path)?;
        ctx.run(async {
            tokio::fs::create_dir_all(&full).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (cleaned, full) = self.resolve(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "refusing to remove the backend root".to_string(),
            });
        }
        ctx.run(async {
            let meta = tokio::fs::metadata(&full)
                .await
                .map_err(|e| map_io(&cleaned, e))?;
            if meta.is_dir() {
                tokio::fs::remove_dir(&full).await?;
            } else {
                tokio::fs::remove_file(&full).await?;
            }
            Ok::<_, Error>(())
        })
        .await
    }

    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error> {
        let (from_cleaned, from_full) = self.resolve(from)?;
        let (_, to_full) = self.resolve(to)?;
        ctx.run(async {
            ensure_parent(&to_full).await?;
            tokio::fs::rename(&from_full, &to_full)
                .await
                .map_err(|e| map_io(&from_cleaned, e))?;
            Ok::<_, Error>(())
        })
        .await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for `file` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

#[async_trait]
impl BackendFactory for LocalBackend {
    async fn create(&self, _ctx: &Context, endpoint: &Endpoint) -> Result<FileSystemRef, Error> {
        Ok(Arc::new(LocalFileSystem::new(local_root(endpoint))))
    }
}
