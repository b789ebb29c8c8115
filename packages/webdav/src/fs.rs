//! [`FileSystem`] over a WebDAV collection.

use std::any::Any;

use async_trait::async_trait;
use bytes::Bytes;

use unifs_core::path::{base_name, clean};
use unifs_core::{sort_entries, Context, DirEntry, Error, FileSystem, Metadata};

use crate::client::{href_path, WebDavClient};
use crate::xml::Resource;
use crate::WebDavError;

/// [`FileSystem`] backed by a connected [`WebDavClient`].
pub struct WebDavFileSystem {
    client: WebDavClient,
}

impl WebDavFileSystem {
    pub fn new(client: WebDavClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &WebDavClient {
        &self.client
    }
}

fn to_metadata(resource: &Resource) -> Metadata {
    if resource.collection {
        Metadata::directory(resource.modified)
    } else {
        Metadata::file(resource.size, resource.modified)
    }
}

/// Map a 404 to [`Error::NotFound`] and leave the rest to the backend error.
fn not_found(path: &str) -> impl FnOnce(WebDavError) -> Error + '_ {
    move |e| match e.status() {
        Some(404) => Error::NotFound {
            path: path.to_string(),
        },
        _ => e.into(),
    }
}

impl WebDavFileSystem {
    async fn stat_cleaned(&self, cleaned: &str) -> Result<Metadata, Error> {
        let url = self.client.config().url_for(cleaned, false);
        let resources = self
            .client
            .propfind(&url, 0)
            .await
            .map_err(not_found(cleaned))?;
        resources
            .first()
            .map(to_metadata)
            .ok_or_else(|| {
                WebDavError::Response {
                    message: format!("empty multistatus for {}", url.path()),
                }
                .into()
            })
    }
}

#[async_trait]
impl FileSystem for WebDavFileSystem {
    fn name(&self) -> &'static str {
        "webdav"
    }

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Metadata, Error> {
        let cleaned = clean(path)?;
        ctx.run(self.stat_cleaned(&cleaned)).await
    }

    async fn read(&self, ctx: &Context, path: &str) -> Result<Bytes, Error> {
        let cleaned = clean(path)?;
        let url = self.client.config().url_for(&cleaned, false);
        ctx.run(async {
            let data = self.client.get(&url).await.map_err(not_found(&cleaned))?;
            Ok::<_, Error>(data)
        })
        .await
    }

    async fn write(&self, ctx: &Context, path: &str, data: Bytes) -> Result<(), Error> {
        let cleaned = clean(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "cannot write to the backend root".to_string(),
            });
        }
        let url = self.client.config().url_for(&cleaned, false);
        ctx.run(async {
            self.client.put(&url, data).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn list(&self, ctx: &Context, path: &str) -> Result<Vec<DirEntry>, Error> {
        let cleaned = clean(path)?;
        let url = self.client.config().url_for(&cleaned, true);
        let own_path = href_path(url.path());

        ctx.run(async {
            let resources = self
                .client
                .propfind(&url, 1)
                .await
                .map_err(not_found(&cleaned))?;

            let mut entries: Vec<DirEntry> = resources
                .iter()
                .filter_map(|resource| {
                    let path = href_path(&resource.href);
                    if path == own_path {
                        return None;
                    }
                    Some(DirEntry {
                        name: base_name(&path).to_string(),
                        metadata: to_metadata(resource),
                    })
                })
                .collect();
            sort_entries(&mut entries);
            Ok::<_, Error>(entries)
        })
        .await
    }

    async fn mkdir(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let cleaned = clean(path)?;
        if cleaned.is_empty() {
            return Ok(());
        }

        let config = self.client.config();
        let mut urls = Vec::new();
        let mut current = String::new();
        for segment in cleaned.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            urls.push(config.url_for(&current, true));
        }

        ctx.run(async {
            for url in &urls {
                self.client.mkcol(url).await?;
            }
            Ok::<_, Error>(())
        })
        .await
    }

    async fn remove(&self, ctx: &Context, path: &str) -> Result<(), Error> {
        let cleaned = clean(path)?;
        if cleaned.is_empty() {
            return Err(Error::InvalidPath {
                message: "refusing to remove the backend root".to_string(),
            });
        }

        ctx.run(async {
            let meta = self.stat_cleaned(&cleaned).await?;
            let url = self.client.config().url_for(&cleaned, meta.is_dir());
            if meta.is_dir() {
                // DELETE on a collection is recursive.
                let children = self.client.propfind(&url, 1).await?;
                if children.len() > 1 {
                    return Err(Error::from(WebDavError::NotEmpty {
                        path: cleaned.clone(),
                    }));
                }
            }
            self.client.delete(&url).await.map_err(not_found(&cleaned))?;
            Ok::<_, Error>(())
        })
        .await
    }

    async fn rename(&self, ctx: &Context, from: &str, to: &str) -> Result<(), Error> {
        let from = clean(from)?;
        let to = clean(to)?;
        if from.is_empty() || to.is_empty() {
            return Err(Error::InvalidPath {
                message: "cannot rename the backend root".to_string(),
            });
        }

        ctx.run(async {
            let meta = self.stat_cleaned(&from).await?;
            let config = self.client.config();
            let source = config.url_for(&from, meta.is_dir());
            let destination = config.url_for(&to, meta.is_dir());
            self.client
                .move_to(&source, &destination)
                .await
                .map_err(not_found(&from))?;
            Ok::<_, Error>(())
        })
        .await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
