//! Client error types.

use std::time::Duration;
use thiserror::Error;

use crate::body::{Body, BodyMode};
use crate::response::Response;

/// Boxed error used to carry transport-specific causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request building error.
    #[error("Failed to build request: {0}")]
    RequestBuild(String),

    /// Connection could not be established.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure reported by the transport.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// The peer rejected a WebSocket upgrade and no interceptor recovered it.
    #[error(transparent)]
    Handshake(#[from] WebSocketHandshakeError),

    /// The transport produced a body that does not match the requested mode.
    #[error("Expected a {expected} body but the transport produced {actual}")]
    BodyMode {
        /// Mode the caller asked for.
        expected: BodyMode,
        /// Mode of the body that was produced.
        actual: BodyMode,
    },

    /// Body could not be read or decoded.
    #[error("Body decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// The peer dropped the WebSocket without a closing handshake.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    /// Wrap an arbitrary transport failure.
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Transport(error.into())
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a rejected WebSocket handshake.
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Handshake(_))
    }

    /// Get the HTTP status code if the error carries a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Handshake(e) => e.response().map(|r| r.code()),
            _ => None,
        }
    }
}

/// A WebSocket upgrade that ended with the peer refusing the handshake.
#[derive(Debug, Error)]
#[error("{}", describe(.response.as_deref()))]
pub struct WebSocketHandshakeError {
    response: Option<Box<Response<Body>>>,
    #[source]
    source: Option<BoxError>,
}

fn describe(response: Option<&Response<Body>>) -> String {
    match response {
        Some(response) => format!("WebSocket handshake failed with status {}", response.code()),
        None => "WebSocket handshake failed".to_string(),
    }
}

impl WebSocketHandshakeError {
    /// Create a handshake error from the last rejecting response.
    pub fn new(response: Option<Response<Body>>) -> Self {
        Self {
            response: response.map(Box::new),
            source: None,
        }
    }

    /// Attach the transport-level cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.source = Some(source.into());
        self
    }

    /// The last response the peer sent while rejecting the upgrade.
    pub fn response(&self) -> Option<&Response<Body>> {
        self.response.as_deref()
    }

    /// Consume the error, returning the rejecting response.
    pub fn into_response(self) -> Option<Response<Body>> {
        self.response.map(|r| *r)
    }

    pub(crate) fn response_mut(&mut self) -> Option<&mut Response<Body>> {
        self.response.as_deref_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use http::StatusCode;

    #[test]
    fn test_handshake_error_message() {
        let request = Request::get("ws://localhost/socket").unwrap();
        let response = Response::new(StatusCode::FORBIDDEN, request, Body::Empty);
        let err = HttpClientError::from(WebSocketHandshakeError::new(Some(response)));

        assert!(err.is_handshake());
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.to_string(), "WebSocket handshake failed with status 403");
    }

    #[test]
    fn test_handshake_error_without_response() {
        let err = WebSocketHandshakeError::new(None);
        assert!(err.response().is_none());
        assert_eq!(err.to_string(), "WebSocket handshake failed");
    }

    #[test]
    fn test_error_classification() {
        assert!(HttpClientError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(HttpClientError::Connection("refused".into()).is_connection());
        assert_eq!(HttpClientError::ConnectionClosed.status_code(), None);
    }
}
