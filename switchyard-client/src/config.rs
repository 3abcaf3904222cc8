//! HTTP client configuration.

use std::fmt;
use std::time::Duration;

/// Credentials the transport uses to answer authentication challenges.
#[derive(Clone, PartialEq, Eq)]
pub enum Authenticator {
    /// Never answer challenges.
    None,
    /// Answer `Basic` challenges with these credentials.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
}

impl Authenticator {
    /// Create a basic authenticator.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// HTTP client configuration.
///
/// Consumed by the transport factory; the interceptor pipeline itself only
/// reads `read_timeout`, as the default timeout of new request builders.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
    /// Default read timeout for new requests and WebSocket handshakes.
    pub read_timeout: Option<Duration>,
    /// Write timeout. Accepted for API compatibility; not enforced.
    pub write_timeout: Option<Duration>,
    /// Authentication challenge handling.
    pub authenticator: Option<Authenticator>,
    /// Whether the client is meant for long-lived streaming responses.
    pub streaming: bool,
    /// User agent string.
    pub user_agent: String,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            authenticator: None,
            streaming: false,
            user_agent: format!("switchyard/{}", env!("CARGO_PKG_VERSION")),
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}
