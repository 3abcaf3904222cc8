//! The network transport.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::sync::Arc;
use std::time::Duration;
use switchyard_client::{
    Body, BodyMode, Handshake, HttpClientConfig, HttpClientError, ListenerAdapter, Request,
    Response, Result, Transport, TransportFactory,
};
use tracing::debug;

/// Keep-alive interval for connections of streaming clients.
const STREAMING_KEEPALIVE: Duration = Duration::from_secs(30);

/// Transport doing HTTP through `reqwest` and WebSocket upgrades through
/// `tokio-tungstenite`.
#[derive(Clone)]
pub struct NetTransport {
    pub(crate) client: reqwest::Client,
    pub(crate) config: Arc<HttpClientConfig>,
}

impl NetTransport {
    /// Create a transport honouring the connection settings of `config`.
    pub fn from_config(config: &HttpClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true);

        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if config.follow_redirects {
            builder = builder.redirect(Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }
        if config.streaming {
            builder = builder.tcp_keepalive(STREAMING_KEEPALIVE);
        }

        let client = builder.build().map_err(HttpClientError::transport)?;
        debug!(user_agent = %config.user_agent, "Created network transport");

        Ok(Self {
            client,
            config: Arc::new(config.clone()),
        })
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

impl std::fmt::Debug for NetTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Transport for NetTransport {
    async fn send(&self, request: &Request, mode: BodyMode) -> Result<Response<Body>> {
        self.exchange(request, mode).await
    }

    async fn upgrade(&self, request: &Request, listener: ListenerAdapter) -> Result<Handshake> {
        self.connect(request, listener).await
    }
}

/// Creates a [`NetTransport`] for every client built.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetTransportFactory;

impl TransportFactory for NetTransportFactory {
    fn create(&self, config: &HttpClientConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(NetTransport::from_config(config)?))
    }
}
