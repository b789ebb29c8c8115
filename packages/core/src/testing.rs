//! In-memory file system for tests.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use crate::path::{base_name, clean};
use crate::traits::sort_entries;
use crate::{
    BackendFactory, Context, DirEntry, Endpoint, Error, FileSystem, FileSystemRef, Metadata,
};

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, Bytes>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn is_dir(&self, path: &str) -> bool {
        if path.is_empty() || self.dirs.contains(path) {
            return true;
        }
        let prefix = format!("{}/", path);
        self.files.keys().any(|k| k.starts_with(&prefix))
            || self.dirs.iter().any(|d| d.starts_with(&prefix))
    }
}

/// A file system that lives in a map.
pub struct MemoryFileSystem {
    name: &'static str,
    tree: Mutex<Tree>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// A memory file system reporting `name` from [`FileSystem::name`].
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            tree: Mutex::new(Tree::default()),
        }
    }

    fn tree(&self) -> std::sync::MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error> {
        ctx.check()?;
        let path = clean(path)?;
        let tree = self.tree();
        if let Some(data) = tree.files.get(&path) {
            return Ok(Metadata::file(data.len() as u64, None));
        }
        if tree.is_dir(&path) {
            return Ok(Metadata::directory(None));
        }
        Err(Error::NotFound { path })
    }

    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error> {
        ctx.check()?;
        let path = clean(path)?;
        self.tree()
            .files
            .get(&path)
            .cloned()
            .ok_or(Error::NotFound { path })
    }

    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error> {
        ctx.check()?;
        let path = clean(path)?;
        self.tree().files.insert(path, data);
        Ok(())
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error> {
        ctx.check()?;
        let path = clean(path)?;
        let tree = self.tree();
        if !tree.is_dir(&path) {
            return Err(Error::NotFound { path });
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };
        let mut seen = BTreeSet::new();
        let mut entries = Vec::new();
        let candidates = tree.files.keys().chain(tree.dirs.iter());
        for key in candidates {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some(child) = rest.split('/').next().filter(|c| !c.is_empty()) else {
                continue;
            };
            if !seen.insert(child.to_string()) {
                continue;
            }
            let full = format!("{}{}", prefix, child);
            let metadata = match tree.files.get(&full) {
                Some(data) => Metadata::file(data.len() as u64, None),
                None => Metadata::directory(None),
            };
            entries.push(DirEntry {
                name: base_name(&full).to_string(),
                metadata,
            });
        }
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        ctx.check()?;
        let path = clean(path)?;
        self.tree().dirs.insert(path);
        Ok(())
    }

    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        ctx.check()?;
        let path = clean(path)?;
        let mut tree = self.tree();
        if tree.files.remove(&path).is_some() || tree.dirs.remove(&path) {
            return Ok(());
        }
        Err(Error::NotFound { path })
    }

    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error> {
        ctx.check()?;
        let from = clean(from)?;
        let to = clean(to)?;
        let mut tree = self.tree();
        let data = tree
            .files
            .remove(&from)
            .ok_or(Error::NotFound { path: from })?;
        tree.files.insert(to, data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory producing a fresh [`MemoryFileSystem`] for any endpoint.
pub struct MemoryBackend;

#[async_trait]
impl BackendFactory for MemoryBackend {
    async fn create(&self, _ctx: &Context, _endpoint: &Endpoint) -> Result<FileSystemRef, Error> {
        Ok(std::sync::Arc::new(MemoryFileSystem::new()))
    }
}
