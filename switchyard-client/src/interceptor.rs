//! Request interceptors.

use http::header;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::body::Body;
use crate::request::basic_credentials;
use crate::{Request, RequestBuilder, Response};

/// Hooks into every exchange and WebSocket handshake of a client.
///
/// Hooks are synchronous and must not block for long; they run in registry
/// order on the task driving the exchange.
pub trait Interceptor: Send + Sync {
    /// Mutate the outgoing request before it is sent.
    ///
    /// Runs once for every attempt, including resends, so it must be safe to
    /// apply repeatedly to the same builder.
    fn before(&self, builder: &mut RequestBuilder, request: &Request) {
        let _ = (builder, request);
    }

    /// Inspect an unsuccessful response and decide whether to resend.
    ///
    /// The builder may be updated (for example with a refreshed credential)
    /// before returning `true`.
    fn after_failure(&self, builder: &mut RequestBuilder, response: &Response<Body>) -> bool {
        let _ = (builder, response);
        false
    }
}

impl<F> Interceptor for F
where
    F: Fn(&mut RequestBuilder, &Request) + Send + Sync,
{
    fn before(&self, builder: &mut RequestBuilder, request: &Request) {
        self(builder, request)
    }
}

/// Logging interceptor that logs requests and failed responses.
pub struct LoggingInterceptor {
    log_headers: bool,
}

impl LoggingInterceptor {
    /// Create a new logging interceptor.
    pub fn new() -> Self {
        Self { log_headers: false }
    }

    /// Enable logging of headers.
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for LoggingInterceptor {
    fn before(&self, _builder: &mut RequestBuilder, request: &Request) {
        tracing::debug!(
            method = %request.method(),
            url = %request.uri(),
            "Sending HTTP request"
        );

        if self.log_headers {
            for (name, value) in request.headers() {
                if name == header::AUTHORIZATION {
                    continue;
                }
                tracing::trace!(header = %name, value = ?value, "Request header");
            }
        }
    }

    fn after_failure(&self, _builder: &mut RequestBuilder, response: &Response<Body>) -> bool {
        tracing::debug!(
            status = %response.status(),
            url = %response.request().uri(),
            "Received unsuccessful HTTP response"
        );
        false
    }
}

/// Authentication interceptor that sets a fixed credential on every request.
pub struct AuthInterceptor {
    auth_type: AuthType,
}

enum AuthType {
    Bearer(String),
    Basic { username: String, password: String },
    ApiKey { header: String, key: String },
}

impl AuthInterceptor {
    /// Create a bearer token interceptor.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer(token.into()),
        }
    }

    /// Create a basic auth interceptor.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Basic {
                username: username.into(),
                password: password.into(),
            },
        }
    }

    /// Create an API key interceptor.
    pub fn api_key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::ApiKey {
                header: header.into(),
                key: key.into(),
            },
        }
    }
}

impl Interceptor for AuthInterceptor {
    fn before(&self, builder: &mut RequestBuilder, _request: &Request) {
        match &self.auth_type {
            AuthType::Bearer(token) => {
                builder.bearer_auth(token);
            }
            AuthType::Basic { username, password } => {
                builder.set_header(
                    header::AUTHORIZATION,
                    basic_credentials(username, Some(password)),
                );
            }
            AuthType::ApiKey { header, key } => {
                builder.set_header(header.as_str(), key.as_str());
            }
        }
    }
}

/// Source of bearer tokens that can be refreshed on demand.
pub trait TokenProvider: Send + Sync {
    /// The token to use for the next request.
    fn token(&self) -> Option<String>;

    /// Obtain a new token after the current one was rejected.
    ///
    /// Later calls to [`token`](Self::token) must return the new token, since
    /// the before-hook runs again for the resend. Returns `None` when no
    /// better token is available.
    fn refresh(&self) -> Option<String>;
}

/// Bearer token holder for callers that refresh tokens out of band.
#[derive(Debug, Default, Clone)]
pub struct StaticToken {
    token: Arc<RwLock<Option<String>>>,
}

impl StaticToken {
    /// Create a holder with an initial token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
        }
    }

    /// Replace the held token.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn refresh(&self) -> Option<String> {
        None
    }
}

/// Sets a bearer token before every attempt and refreshes it on `401`.
///
/// A refreshed token that differs from the rejected one triggers a resend.
pub struct TokenRefreshInterceptor {
    provider: Arc<dyn TokenProvider>,
}

impl TokenRefreshInterceptor {
    /// Create an interceptor backed by a token provider.
    pub fn new(provider: impl TokenProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Create an interceptor from a shared token provider.
    pub fn from_arc(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

impl Interceptor for TokenRefreshInterceptor {
    fn before(&self, builder: &mut RequestBuilder, _request: &Request) {
        if let Some(token) = self.provider.token() {
            builder.bearer_auth(token);
        }
    }

    fn after_failure(&self, builder: &mut RequestBuilder, response: &Response<Body>) -> bool {
        if response.status() != http::StatusCode::UNAUTHORIZED {
            return false;
        }

        let rejected = response.request().header(header::AUTHORIZATION);
        match self.provider.refresh() {
            Some(token) if rejected != Some(format!("Bearer {}", token).as_str()) => {
                tracing::debug!(url = %response.request().uri(), "Refreshed bearer token after 401");
                builder.bearer_auth(token);
                true
            }
            _ => false,
        }
    }
}
