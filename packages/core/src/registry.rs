//! Scheme to backend factory registry.
//!
//! Dispatch is a lookup: the endpoint's scheme tag selects a registered
//! [`BackendFactory`], which builds the file system. New backends are added
//! by registering a factory; the dispatcher itself never changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Context, Endpoint, Error, FileSystemRef};

/// Builds a file system from a resolved endpoint.
///
/// Errors raised while constructing the backend are returned as-is; the
/// registry does not wrap, retry or fall back.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn create(&self, ctx: &Context, endpoint: &Endpoint) -> Result<FileSystemRef, Error>;
}

#[async_trait]
impl<T: BackendFactory + ?Sized> BackendFactory for Arc<T> {
    async fn create(&self, ctx: &Context, endpoint: &Endpoint) -> Result<FileSystemRef, Error> {
        self.as_ref().create(ctx, endpoint).await
    }
}

/// Registry of backend factories keyed by scheme.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// An empty registry; every dispatch fails with
    /// [`Error::UnsupportedScheme`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `scheme`, returning the factory it replaces.
    pub fn register<F>(&mut self, scheme: &str, factory: F) -> Option<Arc<dyn BackendFactory>>
    where
        F: BackendFactory + 'static,
    {
        self.factories
            .insert(scheme.to_ascii_lowercase(), Arc::new(factory))
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, scheme: &str, factory: F) -> Self
    where
        F: BackendFactory + 'static,
    {
        self.register(scheme, factory);
        self
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.factories.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct the file system for `endpoint`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedScheme`] carrying the endpoint when no factory is
    /// registered for its scheme; otherwise whatever the factory returns.
    pub async fn dispatch(&self, ctx: &Context, endpoint: &Endpoint) -> Result<FileSystemRef, Error> {
        let factory = self
            .factories
            .get(&endpoint.scheme)
            .ok_or_else(|| Error::UnsupportedScheme {
                endpoint: endpoint.clone(),
            })?;

        tracing::debug!(endpoint = %endpoint, "constructing backend");
        let fs = factory.create(ctx, endpoint).await?;
        tracing::debug!(backend = fs.name(), endpoint = %endpoint, "backend ready");

        Ok(fs)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("schemes", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
