//! WebSocket upgrades over tokio-tungstenite.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use switchyard_client::{
    Body, Handshake, HttpClientError, ListenerAdapter, Message, MessageType, Request, Response,
    Result, WebSocket, WebSocketHandshakeError,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use tungstenite::client::IntoClientRequest;
use tungstenite::error::ProtocolError;
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::CloseFrame;
use tungstenite::Message as TungsteniteMessage;

use crate::NetTransport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

impl NetTransport {
    /// Attempt one upgrade.
    ///
    /// A non-101 answer from the peer is a rejection; anything that prevents
    /// an answer is an error.
    pub(crate) async fn connect(
        &self,
        request: &Request,
        listener: ListenerAdapter,
    ) -> Result<Handshake> {
        let upgrade = client_request(request)?;
        let connecting = connect_async(upgrade);
        let connected = match request.timeout() {
            Some(timeout) => tokio::time::timeout(timeout, connecting)
                .await
                .map_err(|_| HttpClientError::Timeout(timeout))?,
            None => connecting.await,
        };

        let stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let rejected = match &e {
                    tungstenite::Error::Http(response) => Some(rejection(request, response)),
                    _ => None,
                };
                return match rejected {
                    Some(rejected) => {
                        debug!(url = %request.uri(), error = %e, "WebSocket upgrade rejected");
                        Ok(Handshake::Rejected(rejected.with_source(e)))
                    }
                    None => Err(map_error(e)),
                };
            }
        };
        debug!(url = %request.uri(), "WebSocket connected");

        let (write, read) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let socket = listener.socket(tx);

        tokio::spawn(writer_task(write, rx, listener.clone()));
        listener.on_open(&socket).await;
        tokio::spawn(reader_task(read, socket.clone(), listener));

        Ok(Handshake::Open(socket))
    }
}

/// Build the upgrade request, mapping `http`/`https` to `ws`/`wss`.
fn client_request(request: &Request) -> Result<http::Request<()>> {
    let mut url = request.uri().clone();
    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| HttpClientError::InvalidUrl(request.uri().to_string()))?;
    }

    let mut upgrade = url
        .as_str()
        .into_client_request()
        .map_err(|e| HttpClientError::InvalidUrl(e.to_string()))?;
    for (name, value) in request.headers() {
        upgrade.headers_mut().append(name.clone(), value.clone());
    }
    Ok(upgrade)
}

fn rejection(
    request: &Request,
    response: &http::Response<Option<Vec<u8>>>,
) -> WebSocketHandshakeError {
    let body = match response.body().as_deref() {
        Some(body) if !body.is_empty() => Body::Bytes(Bytes::copy_from_slice(body)),
        _ => Body::Empty,
    };
    let rejected =
        Response::new(response.status(), request.clone(), body).with_headers(response.headers().clone());
    WebSocketHandshakeError::new(Some(rejected))
}

fn map_error(error: tungstenite::Error) -> HttpClientError {
    match error {
        tungstenite::Error::Io(e) => HttpClientError::Connection(e.to_string()),
        tungstenite::Error::Url(e) => HttpClientError::InvalidUrl(e.to_string()),
        other => HttpClientError::transport(other),
    }
}

async fn writer_task(
    mut write: SplitSink<WsStream, TungsteniteMessage>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    listener: ListenerAdapter,
) {
    while let Some(message) = rx.recv().await {
        let is_close = message.is_close();
        let result = write.send(to_tungstenite(&message)).await;
        listener.written(&message);

        if let Err(e) = result {
            debug!(error = %e, "WebSocket write failed");
            break;
        }
        if is_close {
            break;
        }
    }

    discard_pending(&mut rx, &listener);
    let _ = write.close().await;
    trace!("WebSocket writer finished");
}

/// Release the queue counter for messages that will never be written.
fn discard_pending(rx: &mut mpsc::UnboundedReceiver<Message>, listener: &ListenerAdapter) {
    rx.close();
    while let Ok(message) = rx.try_recv() {
        listener.written(&message);
    }
}

async fn reader_task(mut read: SplitStream<WsStream>, socket: WebSocket, listener: ListenerAdapter) {
    while let Some(result) = read.next().await {
        match result {
            Ok(message) => {
                // Keep reading after a close frame so the reply gets flushed.
                if let Some(message) = from_tungstenite(message) {
                    listener.on_message(&socket, message).await;
                }
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => break,
            Err(tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                listener
                    .on_error(&socket, &HttpClientError::ConnectionClosed)
                    .await;
                break;
            }
            Err(e) => {
                listener
                    .on_error(&socket, &HttpClientError::transport(e))
                    .await;
                break;
            }
        }
    }
    trace!("WebSocket reader finished");
}

fn to_tungstenite(message: &Message) -> TungsteniteMessage {
    match message.message_type {
        MessageType::Text => TungsteniteMessage::Text(
            String::from_utf8_lossy(&message.payload).into_owned().into(),
        ),
        MessageType::Binary => TungsteniteMessage::Binary(message.payload.clone()),
        MessageType::Ping => TungsteniteMessage::Ping(message.payload.clone()),
        MessageType::Pong => TungsteniteMessage::Pong(message.payload.clone()),
        MessageType::Close => TungsteniteMessage::Close(message.close_frame().map(
            |(code, reason)| CloseFrame {
                code: CloseCode::from(code),
                reason: reason.into(),
            },
        )),
    }
}

fn from_tungstenite(message: TungsteniteMessage) -> Option<Message> {
    let message = match message {
        TungsteniteMessage::Text(text) => Message::text(text.as_str()),
        TungsteniteMessage::Binary(data) => Message::binary(data),
        TungsteniteMessage::Ping(data) => Message::ping(data),
        TungsteniteMessage::Pong(data) => Message::pong(data),
        TungsteniteMessage::Close(Some(frame)) => {
            Message::close_with(frame.code.into(), frame.reason.as_str())
        }
        TungsteniteMessage::Close(None) => Message::close(),
        TungsteniteMessage::Frame(_) => return None,
    };
    Some(message)
}
