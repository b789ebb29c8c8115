//! [`FileSystem`] over a single, lazily opened FTP session.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;

use unifs_core::path::clean;
use unifs_core::{sort_entries, Context, DirEntry, Error, FileSystem, Metadata};

use crate::connection::Connection;
use crate::{FtpConfig, FtpError};

type Op<'c, T> = Pin<Box<dyn Future<Output = Result<T, FtpError>> + Send + 'c>>;

/// FTP reply for "file unavailable".
const UNAVAILABLE: u16 = 550;

pub struct FtpFileSystem {
    config: FtpConfig,
    /// `None` until the first operation, and again after a session broke.
    connection: Mutex<Option<Connection>>,
}

impl FtpFileSystem {
    /// Build a file system for `config`. Nothing is connected yet.
    pub fn new(config: FtpConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &FtpConfig {
        &self.config
    }

    /// Cleaned relative path and the server path it maps to.
    fn remote(&self, path: &str) -> Result<(String, String), Error> {
        if path.contains(['\r', '\n']) {
            return Err(Error::InvalidPath {
                message: format!("{:?} contains a line break", path),
            });
        }
        let cleaned = clean(path)?;
        let remote = self.config.remote_path(&cleaned);
        Ok((cleaned, remote))
    }

    /// Run `op` on the session, connecting first if needed.
    ///
    /// Sessions survive refused commands. Any other failure, or the
    /// context finishing mid-operation, drops the session so the next
    /// operation starts clean.
    async fn session<T, F>(&self, ctx: &Context, path: &str, op: F) -> Result<T, Error>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Connection) -> Op<'c, T> + Send,
    {
        ctx.run(async {
            let mut slot = self.connection.lock().await;
            let mut conn = match slot.take() {
                Some(conn) => conn,
                None => Connection::open(&self.config).await?,
            };

            let result = op(&mut conn).await;
            if matches!(result, Ok(_) | Err(FtpError::Reply { .. })) {
                *slot = Some(conn);
            }
            result.map_err(|e| match e.reply_code() {
                Some(UNAVAILABLE) => Error::NotFound {
                    path: path.to_string(),
                },
                _ => e.into(),
            })
        })
        .await
    }
}

#[async_trait]
impl FileSystem for FtpFileSystem {
    fn name(&self) -> &'static str {
        "ftp"
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error> {
        let (cleaned, remote) = self.remote(path)?;
        if cleaned.is_empty() {
            return Ok(Metadata::directory(None));
        }

        let found = self
            .session(ctx, &cleaned, move |conn| {
                Box::pin(async move {
                    if let Some(size) = conn.size(&remote).await? {
                        let modified = conn.modified(&remote).await?;
                        return Ok(Some(Metadata::file(size, modified)));
                    }
                    if conn.is_dir(&remote).await? {
                        return Ok(Some(Metadata::directory(None)));
                    }
                    Ok::<_, FtpError>(None)
                })
            })
            .await?;
        found.ok_or(Error::NotFound { path: cleaned })
    }

    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error> {
        let (cleaned, remote) = self.remote(path)?;
        tracing::debug!(path = %remote, "ftp read");
        let data = self
            .session(ctx, &cleaned, move |conn| {
                Box::pin(async move { conn.retrieve(&remote).await })
            })
            .await?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error> {
        let (cleaned, remote) = self.remote(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "cannot write to the backend root".to_string(),
            });
        }
        tracing::debug!(path = %remote, size = data.len(), "ftp write");
        self.session(ctx, &cleaned, move |conn| {
            Box::pin(async move { conn.store(&remote, &data).await })
        })
        .await
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error> {
        let (cleaned, remote) = self.remote(path)?;
        let mut entries = self
            .session(ctx, &cleaned, move |conn| {
                Box::pin(async move { conn.list(&remote).await })
            })
            .await?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (cleaned, _) = self.remote(path)?;
        if cleaned.is_empty() {
            return Ok(());
        }

        // Ancestors outermost first; the missing ones are created in order.
        let mut ancestors = Vec::new();
        let mut current = String::new();
        for segment in cleaned.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            ancestors.push(self.config.remote_path(&current));
        }

        self.session(ctx, &cleaned, move |conn| {
            Box::pin(async move {
                for dir in &ancestors {
                    if !conn.is_dir(dir).await? {
                        conn.make_dir(dir).await?;
                    }
                }
                Ok::<_, FtpError>(())
            })
        })
        .await
    }

    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let (cleaned, remote) = self.remote(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "refusing to remove the backend root".to_string(),
            });
        }
        self.session(ctx, &cleaned, move |conn| {
            Box::pin(async move {
                match conn.delete_file(&remote).await {
                    Err(e) if e.reply_code() == Some(UNAVAILABLE) => {
                        conn.remove_dir(&remote).await
                    }
                    other => other,
                }
            })
        })
        .await
    }

    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error> {
        let (from_cleaned, from_remote) = self.remote(from)?;
        let (_, to_remote) = self.remote(to)?;
        self.session(ctx, &from_cleaned, move |conn| {
            Box::pin(async move { conn.rename(&from_remote, &to_remote).await })
        })
        .await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
