//! HTTP responses and their retry/redirect ancestry.

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::body::{Body, ResponseBody};
use crate::{HttpClientError, Request, Result};

/// A completed exchange.
///
/// The response owns its headers and body. The link to a previous response
/// is shared and read-only; ancestors keep status, headers and request but
/// not their bodies.
#[derive(Debug)]
pub struct Response<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: T,
    request: Request,
    previous: Option<Arc<Response<()>>>,
}

/// Check if a status code is in the conventional success range (2xx).
pub fn is_successful(code: u16) -> bool {
    (200..300).contains(&code)
}

impl<T> Response<T> {
    /// Create a response for the given request.
    pub fn new(status: StatusCode, request: Request, body: T) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
            request,
            previous: None,
        }
    }

    /// Replace the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Link the response this one replaced.
    pub fn with_previous(mut self, previous: impl Into<Arc<Response<()>>>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the status code as an integer.
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        is_successful(self.code())
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the first value of a header.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get every value of a header, in order.
    pub fn header_values(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.headers
            .get_all(name.as_ref())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get the request that produced this response.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Get the response this one replaced, if any.
    pub fn previous_response(&self) -> Option<&Response<()>> {
        self.previous.as_deref()
    }

    /// Iterate over the ancestry, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Response<()>> {
        std::iter::successors(self.previous_response(), |r| r.previous_response())
    }

    /// Get the body.
    pub fn body(&self) -> &T {
        &self.body
    }

    /// Get the body mutably.
    pub fn body_mut(&mut self) -> &mut T {
        &mut self.body
    }

    /// Consume the response and return the body.
    pub fn into_body(self) -> T {
        self.body
    }

    /// Drop the body, keeping status, headers, request and ancestry.
    pub fn into_head(self) -> Response<()> {
        self.map(|_| ())
    }

    /// Convert the body, keeping everything else.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
            request: self.request,
            previous: self.previous,
        }
    }

    pub(crate) fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Response<U>> {
        Ok(Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body)?,
            request: self.request,
            previous: self.previous,
        })
    }

    /// Record `replaced` as the oldest ancestor.
    ///
    /// Ancestry the transport already set (such as an answered auth challenge)
    /// stays closest to this response; `replaced` goes at the tail.
    pub(crate) fn link_previous<U>(&mut self, replaced: Response<U>) {
        let tail = Arc::new(replaced.into_head());
        self.previous = Some(append_ancestor(self.previous.take(), tail));
    }
}

fn append_ancestor(
    link: Option<Arc<Response<()>>>,
    tail: Arc<Response<()>>,
) -> Arc<Response<()>> {
    let Some(head) = link else {
        return tail;
    };
    let previous = append_ancestor(head.previous.clone(), tail);
    Arc::new(Response {
        status: head.status,
        headers: head.headers.clone(),
        body: (),
        request: head.request.clone(),
        previous: Some(previous),
    })
}

impl Response<Body> {
    /// Decode the transport body into a caller-facing body type.
    pub fn decode<T: ResponseBody>(self) -> Result<Response<T>> {
        self.try_map(T::from_body)
    }
}

impl Response<String> {
    /// Parse the body as JSON.
    pub fn json<U: DeserializeOwned>(&self) -> Result<U> {
        serde_json::from_str(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }
}

impl Response<bytes::Bytes> {
    /// Parse the body as JSON.
    pub fn json<U: DeserializeOwned>(&self) -> Result<U> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Decode the body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request() -> Request {
        Request::get("https://api.example.com/pods").unwrap()
    }

    #[test]
    fn test_success_range() {
        assert!(is_successful(200));
        assert!(is_successful(204));
        assert!(is_successful(299));
        assert!(!is_successful(199));
        assert!(!is_successful(301));
        assert!(!is_successful(401));
    }

    #[test]
    fn test_previous_chain() {
        let first = Response::new(StatusCode::UNAUTHORIZED, request(), ()).into_head();
        let second = Response::new(StatusCode::SERVICE_UNAVAILABLE, request(), ())
            .with_previous(first)
            .into_head();
        let last = Response::new(StatusCode::OK, request(), "done".to_string()).with_previous(second);

        let codes: Vec<u16> = last.ancestors().map(|r| r.code()).collect();
        assert_eq!(codes, vec![503, 401]);
        assert_eq!(last.previous_response().unwrap().code(), 503);
    }

    #[test]
    fn test_link_previous_appends_after_existing_ancestry() {
        let challenge = Response::new(StatusCode::UNAUTHORIZED, request(), ()).into_head();
        let mut last =
            Response::new(StatusCode::OK, request(), ()).with_previous(challenge);
        let earlier = Response::new(StatusCode::BAD_GATEWAY, request(), ()).into_head();
        let mut replaced = Response::new(StatusCode::SERVICE_UNAVAILABLE, request(), ());
        replaced.link_previous(earlier);

        last.link_previous(replaced);

        let codes: Vec<u16> = last.ancestors().map(|r| r.code()).collect();
        assert_eq!(codes, vec![401, 503, 502]);
    }

    #[test]
    fn test_decode_and_json() {
        let response = Response::new(
            StatusCode::OK,
            request(),
            Body::Text(r#"{"kind":"Pod"}"#.to_string()),
        );
        let response: Response<String> = response.decode().unwrap();
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["kind"], "Pod");
    }

    #[test]
    fn test_headers() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", "a=1".parse().unwrap());
        headers.append("set-cookie", "b=2".parse().unwrap());
        let response = Response::new(StatusCode::OK, request(), Bytes::from_static(b"ok"))
            .with_headers(headers);

        assert_eq!(response.header_values("Set-Cookie"), vec!["a=1", "b=2"]);
        assert_eq!(response.text().unwrap(), "ok");
    }
}
