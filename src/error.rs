//! Error types for the rental client

use thiserror::Error;

/// Errors that can occur when using the rental client
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Input rejected before any remote call was made
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote store rejected or failed a read
    #[error("Remote read failed: {0}")]
    RemoteRead(String),

    /// The remote store rejected or failed a write
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// A remote call exceeded the configured timeout
    #[error("Remote call timed out")]
    RemoteTimeout,

    /// Blob storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Realtime channel error
    #[error("Realtime error: {0}")]
    Realtime(String),

    /// Authentication error
    #[error("Auth error: {0}")]
    Auth(String),

    /// General error
    #[error("Error: {0}")]
    General(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Create a new remote read error
    pub fn remote_read(message: impl Into<String>) -> Self {
        Error::RemoteRead(message.into())
    }

    /// Create a new remote write error
    pub fn remote_write(message: impl Into<String>) -> Self {
        Error::RemoteWrite(message.into())
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage(message.into())
    }

    /// Create a new realtime error
    pub fn realtime(message: impl Into<String>) -> Self {
        Error::Realtime(message.into())
    }

    /// Create a new auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth(message.into())
    }

    /// Create a new general error
    pub fn general(message: impl Into<String>) -> Self {
        Error::General(message.into())
    }

    /// Classify a failure as a read against the remote store. Timeouts and
    /// validation failures keep their own identity.
    pub(crate) fn into_read(self) -> Self {
        match self {
            Error::RemoteTimeout | Error::Validation(_) => self,
            Error::RemoteRead(_) | Error::RemoteWrite(_) => self,
            other => Error::RemoteRead(other.to_string()),
        }
    }

    /// Classify a failure as a write against the remote store
    pub(crate) fn into_write(self) -> Self {
        match self {
            Error::RemoteTimeout | Error::Validation(_) => self,
            Error::RemoteRead(_) | Error::RemoteWrite(_) => self,
            other => Error::RemoteWrite(other.to_string()),
        }
    }
}
