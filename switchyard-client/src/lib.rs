//! # Switchyard Client
//!
//! An HTTP and WebSocket client whose every exchange passes through an
//! ordered chain of named interceptors.
//!
//! ## Features
//!
//! - **Interceptors**: Mutate outgoing requests and ask for a resend after an
//!   unsuccessful response
//! - **Retry Ancestry**: Every resent response links the response it replaced
//! - **WebSocket Handshakes**: Rejected upgrades go through the same
//!   interceptor chain as HTTP requests
//! - **Body Modes**: Discard, buffer, decode as text or stream a response body
//! - **Blocking Sends**: Synchronous `send` with I/O error mapping
//!
//! The network I/O itself is done by a [`Transport`]; the `switchyard-transport`
//! crate provides one based on `reqwest` and `tokio-tungstenite`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use switchyard_client::{AuthInterceptor, HttpClientBuilder, Request, Response, Transport};
//!
//! async fn fetch(transport: Arc<dyn Transport>) -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClientBuilder::with_transport(transport)
//!         .interceptor("auth", AuthInterceptor::bearer("my-token"))
//!         .build()?;
//!
//!     let request = Request::get("https://api.example.com/users")?;
//!     let response: Response<String> = client.send_async(&request).await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Resending After a Failure
//!
//! ```rust
//! use http::StatusCode;
//! use switchyard_client::{Interceptor, Request, RequestBuilder, Response, Body};
//!
//! struct RetryOnUnavailable;
//!
//! impl Interceptor for RetryOnUnavailable {
//!     fn after_failure(&self, builder: &mut RequestBuilder, response: &Response<Body>) -> bool {
//!         if response.status() == StatusCode::SERVICE_UNAVAILABLE {
//!             builder.set_header("x-retry", "1");
//!             return true;
//!         }
//!         false
//!     }
//! }
//! ```

mod body;
mod client;
mod config;
mod error;
mod exchange;
mod handshake;
mod interceptor;
mod message;
mod registry;
mod request;
mod response;
mod transport;
mod websocket;

pub use body::{Body, BodyMode, BodyStream, ResponseBody};
pub use client::{HttpClient, HttpClientBuilder, TransportFactory};
pub use config::{Authenticator, HttpClientConfig};
pub use error::{BoxError, HttpClientError, Result, WebSocketHandshakeError};
pub use interceptor::{
    AuthInterceptor, Interceptor, LoggingInterceptor, StaticToken, TokenProvider,
    TokenRefreshInterceptor,
};
pub use message::{Message, MessageType};
pub use registry::InterceptorRegistry;
pub use request::{Request, RequestBuilder};
pub use response::{is_successful, Response};
pub use transport::{Handshake, Transport};
pub use websocket::{Listener, ListenerAdapter, WebSocket, WebSocketBuilder};

// Re-export common types
pub use bytes::Bytes;
pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use switchyard_client::prelude::*;
/// ```
pub mod prelude {
    pub use crate::body::{Body, BodyMode, BodyStream, ResponseBody};
    pub use crate::client::{HttpClient, HttpClientBuilder, TransportFactory};
    pub use crate::config::{Authenticator, HttpClientConfig};
    pub use crate::error::{HttpClientError, Result, WebSocketHandshakeError};
    pub use crate::interceptor::{AuthInterceptor, Interceptor, LoggingInterceptor};
    pub use crate::request::{Request, RequestBuilder};
    pub use crate::response::Response;
    pub use crate::transport::{Handshake, Transport};
    pub use crate::websocket::{Listener, WebSocket, WebSocketBuilder};
    pub use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
}
