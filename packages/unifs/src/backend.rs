//! The backend descriptor: an endpoint plus overrides, turned into a file
//! system capability on [`init`](FileSystemBackend::init).

use std::fmt;

use serde::Deserialize;

use unifs_core::{BackendRegistry, Context, Endpoint, Error, FileSystemRef};

use crate::resolve::{resolve, Overrides};

/// Configuration for one mounted file system.
///
/// Deserialises from camelCase keys, all optional:
///
/// ```json
/// {
///   "backend": "s3://AKID:SECRET@s3.example.com/bucket",
///   "pathOverwrite": "/other-bucket",
///   "extraOverwrite": "region=eu-west-1"
/// }
/// ```
///
/// An empty or missing `backend` leaves the descriptor disabled.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileSystemBackend {
    pub backend: Endpoint,
    pub username_overwrite: String,
    pub password_overwrite: String,
    pub path_overwrite: String,
    pub extra_overwrite: String,

    #[serde(skip)]
    file_system: Option<FileSystemRef>,
}

impl FileSystemBackend {
    pub fn new(backend: Endpoint) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username_overwrite = username.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password_overwrite = password.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path_overwrite = path.into();
        self
    }

    pub fn with_extras(mut self, extras: impl Into<String>) -> Self {
        self.extra_overwrite = extras.into();
        self
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            username: self.username_overwrite.clone(),
            password: self.password_overwrite.clone(),
            path: self.path_overwrite.clone(),
            extras: self.extra_overwrite.clone(),
        }
    }

    /// True when no backend endpoint is configured.
    pub fn disabled(&self) -> bool {
        self.backend.is_zero()
    }

    /// Resolve the endpoint against the overrides without building anything.
    pub fn resolved_endpoint(&self) -> Result<Endpoint, Error> {
        resolve(&self.backend, &self.overrides())
    }

    /// Build the capability with the built-in backends.
    ///
    /// Does nothing for a disabled descriptor. On failure no capability is
    /// left behind, even one from an earlier successful `init`.
    pub async fn init(&mut self, ctx: &Context) -> Result<(), Error> {
        self.init_with(ctx, &crate::default_registry()).await
    }

    /// [`init`](Self::init) against a caller-supplied registry.
    pub async fn init_with(&mut self, ctx: &Context, registry: &BackendRegistry) -> Result<(), Error> {
        self.file_system = None;
        if self.disabled() {
            tracing::trace!("backend disabled");
            return Ok(());
        }

        let endpoint = self.resolved_endpoint()?;
        let fs = registry.dispatch(ctx, &endpoint).await?;
        self.file_system = Some(fs);
        Ok(())
    }

    /// The capability built by the last successful [`init`](Self::init).
    pub fn file_system(&self) -> Option<FileSystemRef> {
        self.file_system.clone()
    }

    /// Derive a context publishing the capability, or return `ctx` as-is
    /// when there is none.
    pub fn inject_context(&self, ctx: &Context) -> Context {
        match &self.file_system {
            Some(fs) => ctx.with_file_system(fs.clone()),
            None => ctx.clone(),
        }
    }
}

impl fmt::Debug for FileSystemBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password_overwrite.is_empty() {
            ""
        } else {
            "***"
        };
        f.debug_struct("FileSystemBackend")
            .field("backend", &self.backend)
            .field("username_overwrite", &self.username_overwrite)
            .field("password_overwrite", &password)
            .field("path_overwrite", &self.path_overwrite)
            .field("extra_overwrite", &self.extra_overwrite)
            .field("file_system", &self.file_system.as_ref().map(|fs| fs.name()))
            .finish()
    }
}
