//! Failure taxonomy for backend access.
//!
//! Every fallible operation in [`crate::core::client`] and the transports
//! returns one of these variants. The `Display` text is what ultimately
//! reaches the embedder through a stream error event, so the formats here are
//! part of the user-visible contract: an HTTP failure renders as
//! `HTTP <status>: <body>` with the response body passed through verbatim.

use std::error;
use std::fmt;

/// The error type for backend client and session operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientError {
    /// The backend answered with a non-2xx status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text, surfaced verbatim.
        body: String,
    },

    /// The transport could not complete the request at all.
    Network {
        /// Human-readable description of the transport failure.
        message: String,
    },

    /// A response or stream frame could not be decoded.
    Parse {
        /// Human-readable description of the decode failure.
        message: String,
    },

    /// The client was constructed without a deployment URL or credential.
    /// Requests are never issued in this state.
    Unavailable,
}

impl ClientError {
    /// Creates a new HTTP-status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        ClientError::Http {
            status,
            body: body.into(),
        }
    }

    /// Creates a new transport-failure error.
    pub fn network(message: impl Into<String>) -> Self {
        ClientError::Network {
            message: message.into(),
        }
    }

    /// Creates a new decode-failure error.
    pub fn parse(message: impl Into<String>) -> Self {
        ClientError::Parse {
            message: message.into(),
        }
    }

    /// Returns true if this error is an HTTP-status error.
    pub fn is_http(&self) -> bool {
        matches!(self, ClientError::Http { .. })
    }

    /// Returns true if this error is a transport failure.
    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network { .. })
    }

    /// Returns true if this error is a decode failure.
    pub fn is_parse(&self) -> bool {
        matches!(self, ClientError::Parse { .. })
    }

    /// Returns true if the client was never usable to begin with.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ClientError::Unavailable)
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            ClientError::Network { message } => write!(f, "network error: {message}"),
            ClientError::Parse { message } => write!(f, "invalid response payload: {message}"),
            ClientError::Unavailable => {
                write!(f, "client unavailable: no deployment URL or access token")
            }
        }
    }
}

impl error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::parse(err.to_string());
        }

        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        ClientError::network(message)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::parse(err.to_string())
    }
}

/// A specialized Result type for Brook client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
