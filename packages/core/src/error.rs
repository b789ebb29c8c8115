//! Error types for the core layer.

use crate::endpoint::Endpoint;

/// Boxed error produced by a backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors at the core layer.
///
/// Backend failures are carried in [`Error::Backend`] untranslated: callers
/// can downcast the source to the backend's own error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration could not be applied to an endpoint.
    #[error("config error: {message}")]
    Config { message: String },

    /// No backend is registered for the endpoint's scheme.
    ///
    /// The endpoint renders without its password.
    #[error("unsupported {endpoint}")]
    UnsupportedScheme { endpoint: Endpoint },

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint: {message}")]
    InvalidEndpoint { message: String },

    /// A backend-relative path is not acceptable.
    #[error("invalid path: {message}")]
    InvalidPath { message: String },

    /// The path does not exist on the backend.
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure raised by a backend, propagated unchanged.
    #[error(transparent)]
    Backend(BoxError),

    /// The processing context was cancelled.
    #[error("context cancelled")]
    Cancelled,

    /// The processing context's deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Wrap a backend error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend(Box::new(error))
    }

    /// Downcast a [`Error::Backend`] source to a concrete backend error.
    pub fn downcast_backend<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Error::Backend(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// True for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
