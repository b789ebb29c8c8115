//! Errors raised by the WebDAV backend.

#[derive(thiserror::Error, Debug)]
pub enum WebDavError {
    #[error("webdav: invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("webdav: HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdav: URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("webdav: {method} {path} returned {status}")]
    Status {
        method: String,
        path: String,
        status: u16,
    },

    #[error("webdav: directory {path:?} is not empty")]
    NotEmpty { path: String },

    #[error("webdav: malformed response: {message}")]
    Response { message: String },
}

impl WebDavError {
    /// HTTP status when the server answered with an unexpected one.
    pub fn status(&self) -> Option<u16> {
        match self {
            WebDavError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<WebDavError> for unifs_core::Error {
    fn from(error: WebDavError) -> Self {
        unifs_core::Error::backend(error)
    }
}
