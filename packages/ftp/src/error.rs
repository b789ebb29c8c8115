//! Errors raised by the FTP backend.

#[derive(thiserror::Error, Debug)]
pub enum FtpError {
    #[error("ftp: invalid config: {message}")]
    InvalidConfig { message: String },

    #[error("ftp: I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ftp: TLS error: {message}")]
    Tls { message: String },

    #[error("ftp: connecting to {address} timed out")]
    ConnectTimeout { address: String },

    #[error("ftp: {command} failed: {code} {message}")]
    Reply {
        command: String,
        code: u16,
        message: String,
    },

    #[error("ftp: protocol error: {message}")]
    Protocol { message: String },
}

impl FtpError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        FtpError::Protocol {
            message: message.into(),
        }
    }

    /// Reply code when the server refused a command.
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            FtpError::Reply { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<rustls::Error> for FtpError {
    fn from(error: rustls::Error) -> Self {
        FtpError::Tls {
            message: error.to_string(),
        }
    }
}

impl From<FtpError> for unifs_core::Error {
    fn from(error: FtpError) -> Self {
        unifs_core::Error::backend(error)
    }
}
