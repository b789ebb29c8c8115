//! Errors raised by the S3 backend.

#[derive(thiserror::Error, Debug)]
pub enum S3Error {
    #[error("s3: missing credentials (access key id and secret access key are required)")]
    MissingCredentials,

    #[error("s3: missing bucket in endpoint path")]
    MissingBucket,

    #[error("s3: invalid bucket name {bucket:?}")]
    InvalidBucket { bucket: String },

    #[error("s3: invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("s3: HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("s3: URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("s3: {status} {code}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("s3: directory {path:?} is not empty")]
    NotEmpty { path: String },

    #[error("s3: malformed response: {message}")]
    Response { message: String },
}

impl From<S3Error> for unifs_core::Error {
    fn from(error: S3Error) -> Self {
        unifs_core::Error::backend(error)
    }
}
