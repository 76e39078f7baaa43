//! Error types for the Spacelift client

use thiserror::Error;

/// Result type alias for Spacelift client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Coarse classification of a [`ClientError`].
///
/// Retry decisions are made on the kind, never on error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request never produced a usable response (connect, TLS, body read)
    Transport,
    /// Exchanging the API key for a bearer token failed
    AuthExchange,
    /// The API executed the request but reported errors
    RemoteQuery,
    /// The API rejected the bearer token
    Unauthorized,
    /// The caller's deadline elapsed before a response arrived
    DeadlineExceeded,
}

/// Errors that can occur when talking to the Spacelift API
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed before a response was received
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status and no GraphQL payload
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The API rejected the presented credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The API returned application-level errors
    #[error("API returned errors: {}", .messages.join("; "))]
    RemoteQuery { messages: Vec<String> },

    /// The response could not be decoded into the requested shape
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The token exchange failed
    #[error("could not exchange API key for a token: {0}")]
    AuthExchange(String),

    /// No token has been obtained yet
    #[error("no bearer token has been obtained yet")]
    NoToken,

    /// The deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// URL parsing failed
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Http(err) if err.is_timeout() => ErrorKind::DeadlineExceeded,
            ClientError::Http(_) | ClientError::Status { .. } | ClientError::Url(_) => {
                ErrorKind::Transport
            }
            ClientError::Unauthorized(_) => ErrorKind::Unauthorized,
            ClientError::RemoteQuery { .. } | ClientError::Decode(_) => ErrorKind::RemoteQuery,
            ClientError::AuthExchange(_) | ClientError::NoToken => ErrorKind::AuthExchange,
            ClientError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
        }
    }

    /// Check if this error is an authorization failure
    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }
}
