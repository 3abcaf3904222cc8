//! Response bodies and body decoding modes.

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{HttpClientError, Result};

/// How the transport should consume a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyMode {
    /// Drain and drop the body.
    Discard,
    /// Buffer the body as raw bytes.
    Bytes,
    /// Buffer the body and decode it as UTF-8 text.
    Text,
    /// Hand the body to the caller as a stream of chunks.
    Stream,
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyMode::Discard => "discarded",
            BodyMode::Bytes => "bytes",
            BodyMode::Text => "text",
            BodyMode::Stream => "streaming",
        };
        f.write_str(name)
    }
}

/// A streaming response body.
///
/// The inner stream only needs to be `Send`; access always goes through
/// `&mut self`, so the lock is never contended and the wrapper is `Sync`.
pub struct BodyStream {
    inner: Mutex<Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>>,
}

impl BodyStream {
    /// Wrap a stream of body chunks.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self {
            inner: Mutex::new(Box::pin(stream)),
        }
    }

    /// A stream yielding a single buffered chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(futures::stream::iter([Ok(bytes.into())]))
    }

    /// Read the remaining chunks into one buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        let chunks: Vec<Bytes> = self.try_collect().await?;
        Ok(chunks.concat().into())
    }

    /// Read the remaining chunks and decode them as UTF-8.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }
}

impl Stream for BodyStream {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.get_mut().as_mut().poll_next(cx)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyStream").finish_non_exhaustive()
    }
}

/// Untyped body as produced by a transport.
#[derive(Debug)]
pub enum Body {
    /// No body, or a body that was discarded.
    Empty,
    /// Buffered raw bytes.
    Bytes(Bytes),
    /// Buffered UTF-8 text.
    Text(String),
    /// Unread stream.
    Stream(BodyStream),
}

impl Body {
    /// The decoding mode this body corresponds to.
    pub fn mode(&self) -> BodyMode {
        match self {
            Body::Empty => BodyMode::Discard,
            Body::Bytes(_) => BodyMode::Bytes,
            Body::Text(_) => BodyMode::Text,
            Body::Stream(_) => BodyMode::Stream,
        }
    }

    /// Borrow a buffered body as bytes.
    ///
    /// Streams and discarded bodies return `None`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Bytes(bytes) => Some(bytes),
            Body::Text(text) => Some(text.as_bytes()),
            Body::Empty | Body::Stream(_) => None,
        }
    }

    /// Borrow a buffered body as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            Body::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            Body::Empty | Body::Stream(_) => None,
        }
    }

    /// Check whether the body carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(bytes) => bytes.is_empty(),
            Body::Text(text) => text.is_empty(),
            Body::Stream(_) => false,
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Self {
        Body::Stream(stream)
    }
}

/// A caller-facing body type with a fixed decoding mode.
///
/// Each implementation picks the mode the transport is asked for and converts
/// the untyped [`Body`] it gets back.
pub trait ResponseBody: Sized + Send + 'static {
    /// Mode requested from the transport.
    const MODE: BodyMode;

    /// Convert the transport body into this type.
    fn from_body(body: Body) -> Result<Self>;
}

impl ResponseBody for () {
    const MODE: BodyMode = BodyMode::Discard;

    fn from_body(_body: Body) -> Result<Self> {
        Ok(())
    }
}

impl ResponseBody for Bytes {
    const MODE: BodyMode = BodyMode::Bytes;

    fn from_body(body: Body) -> Result<Self> {
        match body {
            Body::Bytes(bytes) => Ok(bytes),
            Body::Empty => Ok(Bytes::new()),
            other => Err(mismatch(Self::MODE, &other)),
        }
    }
}

impl ResponseBody for String {
    const MODE: BodyMode = BodyMode::Text;

    fn from_body(body: Body) -> Result<Self> {
        match body {
            Body::Text(text) => Ok(text),
            Body::Empty => Ok(String::new()),
            other => Err(mismatch(Self::MODE, &other)),
        }
    }
}

impl ResponseBody for BodyStream {
    const MODE: BodyMode = BodyMode::Stream;

    fn from_body(body: Body) -> Result<Self> {
        match body {
            Body::Stream(stream) => Ok(stream),
            Body::Empty => Ok(BodyStream::new(futures::stream::empty())),
            other => Err(mismatch(Self::MODE, &other)),
        }
    }
}

fn mismatch(expected: BodyMode, body: &Body) -> HttpClientError {
    HttpClientError::BodyMode {
        expected,
        actual: body.mode(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        assert_eq!(<() as ResponseBody>::MODE, BodyMode::Discard);
        assert_eq!(<Bytes as ResponseBody>::MODE, BodyMode::Bytes);
        assert_eq!(<String as ResponseBody>::MODE, BodyMode::Text);
        assert_eq!(<BodyStream as ResponseBody>::MODE, BodyMode::Stream);
    }

    #[test]
    fn test_mismatched_body() {
        let err = String::from_body(Body::Bytes(Bytes::from_static(b"abc"))).unwrap_err();
        assert!(matches!(
            err,
            HttpClientError::BodyMode {
                expected: BodyMode::Text,
                actual: BodyMode::Bytes
            }
        ));
    }

    #[test]
    fn test_body_views() {
        let body = Body::Bytes(Bytes::from_static(b"denied"));
        assert_eq!(body.as_text(), Some("denied"));
        assert!(!body.is_empty());
        assert!(Body::Empty.is_empty());
        assert!(Body::Empty.as_bytes().is_none());
    }

    #[tokio::test]
    async fn test_stream_collects() {
        let stream = BodyStream::new(futures::stream::iter([
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ]));
        assert_eq!(stream.text().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_stream_error() {
        let stream = BodyStream::new(futures::stream::iter([Err(std::io::Error::other(
            "reset",
        ))]));
        assert!(matches!(stream.bytes().await, Err(HttpClientError::Io(_))));
    }
}
