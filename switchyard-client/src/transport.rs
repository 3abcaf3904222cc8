//! The boundary to the component doing network I/O.

use async_trait::async_trait;

use crate::body::{Body, BodyMode};
use crate::error::WebSocketHandshakeError;
use crate::websocket::{ListenerAdapter, WebSocket};
use crate::{Request, Response, Result};

/// Outcome of one WebSocket upgrade attempt that reached the peer.
#[derive(Debug)]
pub enum Handshake {
    /// The upgrade succeeded.
    Open(WebSocket),
    /// The peer refused the upgrade, usually with an HTTP response.
    Rejected(WebSocketHandshakeError),
}

/// Performs single exchanges and upgrade attempts.
///
/// Implementations do not retry on their own, apart from answering a
/// configured authentication challenge or following redirects; such inner
/// attempts should be recorded as the final response's ancestry.
/// Connection-level failures are returned as `Err`; an unsuccessful status is
/// a normal `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and read its body according to `mode`.
    async fn send(&self, request: &Request, mode: BodyMode) -> Result<Response<Body>>;

    /// Attempt one WebSocket upgrade.
    ///
    /// Inbound events of the resulting socket are delivered through `listener`,
    /// whose queue counter the produced handle must share.
    async fn upgrade(&self, request: &Request, listener: ListenerAdapter) -> Result<Handshake>;
}
