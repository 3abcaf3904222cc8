//! WebSocket handles, listeners and the handshake builder.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::message::{Message, MessageType};
use crate::{HttpClient, HttpClientError, RequestBuilder, Result};

/// Handle to a live WebSocket.
///
/// Sends are queued to the transport's writer; [`queue_size`](Self::queue_size)
/// reports the payload bytes not yet written.
#[derive(Debug, Clone)]
pub struct WebSocket {
    outbound: mpsc::UnboundedSender<Message>,
    queue_size: Arc<AtomicU64>,
    closing: Arc<AtomicBool>,
}

impl WebSocket {
    /// Create a handle writing into `outbound`.
    ///
    /// The writer draining `outbound` must subtract each written payload
    /// length from `queue_size`.
    pub fn new(outbound: mpsc::UnboundedSender<Message>, queue_size: Arc<AtomicU64>) -> Self {
        Self {
            outbound,
            queue_size,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    fn enqueue(&self, message: Message) -> bool {
        if self.closing.load(Ordering::Acquire) {
            return false;
        }
        let len = message.len() as u64;
        self.queue_size.fetch_add(len, Ordering::AcqRel);
        if self.outbound.send(message).is_err() {
            self.queue_size.fetch_sub(len, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Queue a binary message. Returns `false` if the socket is closing or closed.
    pub fn send(&self, data: impl Into<Bytes>) -> bool {
        self.enqueue(Message::binary(data))
    }

    /// Queue a text message. Returns `false` if the socket is closing or closed.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.enqueue(Message::text(text))
    }

    /// Queue a close frame. Only the first call has an effect.
    pub fn send_close(&self, code: u16, reason: &str) -> bool {
        let sent = self.enqueue(Message::close_with(code, reason));
        if sent {
            self.closing.store(true, Ordering::Release);
        }
        sent
    }

    /// Payload bytes queued but not yet written by the transport.
    pub fn queue_size(&self) -> u64 {
        self.queue_size.load(Ordering::Acquire)
    }

    /// Check if the socket no longer accepts messages.
    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::Acquire) || self.outbound.is_closed()
    }
}

/// Receives the events of a WebSocket.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Called once the handshake succeeded.
    async fn on_open(&self, socket: &WebSocket) {
        let _ = socket;
    }

    /// Called for every text message.
    async fn on_message(&self, socket: &WebSocket, text: &str);

    /// Called for every binary message.
    async fn on_binary(&self, socket: &WebSocket, data: Bytes) {
        let _ = (socket, data);
    }

    /// Called when the peer closes the connection.
    async fn on_close(&self, socket: &WebSocket, code: u16, reason: &str) {
        let _ = (socket, code, reason);
    }

    /// Called when the connection fails after the handshake.
    async fn on_error(&self, socket: &WebSocket, error: &HttpClientError) {
        let _ = socket;
        tracing::error!(error = %error, "WebSocket error");
    }
}

/// Bridges transport events to a caller's [`Listener`].
///
/// One adapter is created per handshake attempt; it owns that attempt's
/// outbound queue counter.
#[derive(Clone)]
pub struct ListenerAdapter {
    listener: Arc<dyn Listener>,
    queue_size: Arc<AtomicU64>,
}

impl ListenerAdapter {
    /// Create an adapter with a fresh queue counter.
    pub fn new(listener: Arc<dyn Listener>) -> Self {
        Self {
            listener,
            queue_size: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of queued outbound payload bytes.
    pub fn queue_size(&self) -> &Arc<AtomicU64> {
        &self.queue_size
    }

    /// Create the socket handle for this attempt.
    pub fn socket(&self, outbound: mpsc::UnboundedSender<Message>) -> WebSocket {
        WebSocket::new(outbound, Arc::clone(&self.queue_size))
    }

    /// Record that a queued message was written.
    pub fn written(&self, message: &Message) {
        self.queue_size
            .fetch_sub(message.len() as u64, Ordering::AcqRel);
    }

    /// Forward the open event.
    pub async fn on_open(&self, socket: &WebSocket) {
        self.listener.on_open(socket).await;
    }

    /// Forward an inbound message to the matching listener callback.
    ///
    /// Ping and pong frames are answered by the transport and not forwarded.
    pub async fn on_message(&self, socket: &WebSocket, message: Message) {
        match message.message_type {
            MessageType::Text => match message.as_text() {
                Some(text) => self.listener.on_message(socket, text).await,
                None => {
                    let error = HttpClientError::Decode("text frame is not valid UTF-8".into());
                    self.listener.on_error(socket, &error).await;
                }
            },
            MessageType::Binary => self.listener.on_binary(socket, message.payload).await,
            MessageType::Close => {
                let (code, reason) = message.close_frame().unwrap_or((1005, String::new()));
                self.listener.on_close(socket, code, &reason).await;
            }
            MessageType::Ping | MessageType::Pong => {}
        }
    }

    /// Forward a connection error.
    pub async fn on_error(&self, socket: &WebSocket, error: &HttpClientError) {
        self.listener.on_error(socket, error).await;
    }
}

/// Builder for a WebSocket connection made through an [`HttpClient`].
///
/// The handshake request passes through the client's interceptors exactly like
/// an HTTP request.
#[derive(Clone)]
pub struct WebSocketBuilder {
    client: HttpClient,
    request: RequestBuilder,
}

impl WebSocketBuilder {
    pub(crate) fn new(client: HttpClient, timeout: Option<Duration>) -> Self {
        let mut request = RequestBuilder::new();
        request.set_timeout(timeout);
        Self { client, request }
    }

    /// Set the WebSocket URI (`ws`, `wss`, `http` or `https`).
    pub fn uri(mut self, uri: impl AsRef<str>) -> Self {
        self.request.uri(uri);
        self
    }

    /// Append a handshake header.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.request.header(name, value);
        self
    }

    /// Replace a handshake header.
    pub fn set_header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.request.set_header(name, value);
        self
    }

    /// Request a subprotocol.
    pub fn subprotocol(mut self, protocol: impl AsRef<str>) -> Self {
        self.request
            .set_header(http::header::SEC_WEBSOCKET_PROTOCOL, protocol.as_ref());
        self
    }

    /// Bound the duration of each handshake attempt.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout(timeout);
        self
    }

    /// The handshake request as configured so far.
    pub fn request(&self) -> &RequestBuilder {
        &self.request
    }

    /// Run the handshake, returning the live socket.
    ///
    /// A rejected upgrade that no interceptor recovers fails with
    /// [`HttpClientError::Handshake`] carrying the last peer response.
    pub async fn build_async<L: Listener>(&self, listener: L) -> Result<WebSocket> {
        self.client
            .handshake(self.request.clone(), Arc::new(listener))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Listener for Recorder {
        async fn on_message(&self, _socket: &WebSocket, text: &str) {
            self.events.lock().push(format!("text:{}", text));
        }

        async fn on_binary(&self, _socket: &WebSocket, data: Bytes) {
            self.events.lock().push(format!("binary:{}", data.len()));
        }

        async fn on_close(&self, _socket: &WebSocket, code: u16, reason: &str) {
            self.events.lock().push(format!("close:{}:{}", code, reason));
        }
    }

    #[tokio::test]
    async fn test_queue_accounting() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder::default());
        let adapter = ListenerAdapter::new(recorder);
        let socket = adapter.socket(tx);

        assert!(socket.send_text("hello"));
        assert!(socket.send(vec![0u8; 10]));
        assert_eq!(socket.queue_size(), 15);

        let written = rx.recv().await.unwrap();
        adapter.written(&written);
        assert_eq!(socket.queue_size(), 10);
    }

    #[tokio::test]
    async fn test_close_stops_sends() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let socket = WebSocket::new(tx, Arc::new(AtomicU64::new(0)));

        assert!(socket.send_close(1000, "done"));
        assert!(socket.is_closed());
        assert!(!socket.send_text("late"));
        assert!(!socket.send_close(1000, "again"));

        let close = rx.recv().await.unwrap();
        assert_eq!(close.close_frame(), Some((1000, "done".to_string())));
    }

    #[tokio::test]
    async fn test_send_after_transport_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = WebSocket::new(tx, Arc::new(AtomicU64::new(0)));
        drop(rx);

        assert!(socket.is_closed());
        assert!(!socket.send_text("lost"));
        assert_eq!(socket.queue_size(), 0);
    }

    #[tokio::test]
    async fn test_adapter_dispatch() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let recorder = Arc::new(Recorder::default());
        let adapter = ListenerAdapter::new(recorder.clone());
        let socket = adapter.socket(tx);

        adapter.on_message(&socket, Message::text("hi")).await;
        adapter.on_message(&socket, Message::binary(vec![1, 2, 3])).await;
        adapter.on_message(&socket, Message::ping(Bytes::new())).await;
        adapter.on_message(&socket, Message::close_with(1001, "away")).await;
        adapter.on_message(&socket, Message::close()).await;

        assert_eq!(
            *recorder.events.lock(),
            vec!["text:hi", "binary:3", "close:1001:away", "close:1005:"]
        );
    }
}
