//! Immutable requests and their builder.

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::{HttpClientError, Result};

/// An immutable HTTP request.
///
/// Requests are cheap to clone. Mutation always goes through a
/// [`RequestBuilder`] obtained from [`Request::to_builder`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    uri: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
}

impl Request {
    /// Create a new request builder.
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    /// Shorthand for a GET request without headers or body.
    pub fn get(uri: impl AsRef<str>) -> Result<Self> {
        let mut builder = RequestBuilder::new();
        builder.uri(uri);
        builder.build()
    }

    /// Copy this request into a fresh builder.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            method: self.method.clone(),
            uri: Some(self.uri.clone()),
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
            error: None,
        }
    }

    /// Get the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the request URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Get all request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get the first value of a header.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Get every value of a header, in insertion order.
    pub fn header_values(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.headers
            .get_all(name.as_ref())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get the request body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Get the read timeout for this request.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Mutable builder for [`Request`].
///
/// Mutators take `&mut self` so that interceptors can edit a builder in place.
/// The first invalid input is remembered and reported by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: Option<Url>,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    error: Option<BuildError>,
}

#[derive(Debug, Clone)]
enum BuildError {
    Url(String),
    Request(String),
}

impl From<BuildError> for HttpClientError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Url(msg) => HttpClientError::InvalidUrl(msg),
            BuildError::Request(msg) => HttpClientError::RequestBuild(msg),
        }
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    /// Create an empty GET builder.
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            uri: None,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            error: None,
        }
    }

    fn fail(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Set the request URI.
    pub fn uri(&mut self, uri: impl AsRef<str>) -> &mut Self {
        match Url::parse(uri.as_ref()) {
            Ok(url) => self.uri = Some(url),
            Err(e) => self.fail(BuildError::Url(format!("{}: {}", uri.as_ref(), e))),
        }
        self
    }

    /// Set the request URI from an already parsed URL.
    pub fn url(&mut self, url: Url) -> &mut Self {
        self.uri = Some(url);
        self
    }

    /// Get the URI currently set on the builder.
    pub fn current_uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    /// Set the request method.
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = method;
        self
    }

    /// Append a header value, keeping existing values for the same name.
    pub fn header<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        match header_pair(name, value) {
            Ok((name, value)) => {
                self.headers.append(name, value);
            }
            Err(e) => self.fail(BuildError::Request(e.to_string())),
        }
        self
    }

    /// Replace every value of a header with a single value.
    pub fn set_header<K, V>(&mut self, name: K, value: V) -> &mut Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        match header_pair(name, value) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(e) => self.fail(BuildError::Request(e.to_string())),
        }
        self
    }

    /// Remove every value of a header.
    pub fn remove_header(&mut self, name: impl AsRef<str>) -> &mut Self {
        self.headers.remove(name.as_ref());
        self
    }

    /// Get the headers currently set on the builder.
    pub fn current_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set the method, content type and body in one step.
    pub fn body(
        &mut self,
        method: Method,
        content_type: impl AsRef<str>,
        body: impl Into<Bytes>,
    ) -> &mut Self {
        self.method = method;
        self.set_header(header::CONTENT_TYPE, content_type.as_ref());
        self.body = Some(body.into());
        self
    }

    /// POST the given body.
    pub fn post(&mut self, content_type: impl AsRef<str>, body: impl Into<Bytes>) -> &mut Self {
        self.body(Method::POST, content_type, body)
    }

    /// PUT the given body.
    pub fn put(&mut self, content_type: impl AsRef<str>, body: impl Into<Bytes>) -> &mut Self {
        self.body(Method::PUT, content_type, body)
    }

    /// PATCH the given body.
    pub fn patch(&mut self, content_type: impl AsRef<str>, body: impl Into<Bytes>) -> &mut Self {
        self.body(Method::PATCH, content_type, body)
    }

    /// Turn this into a DELETE without a body.
    pub fn delete(&mut self) -> &mut Self {
        self.method = Method::DELETE;
        self.body = None;
        self
    }

    /// Set a JSON body; the method is left unchanged.
    pub fn json<T: Serialize + ?Sized>(&mut self, json: &T) -> &mut Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                self.body = Some(bytes.into());
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize JSON body");
                self.fail(BuildError::Request(format!("JSON body: {}", e)));
            }
        }
        self
    }

    /// Set a URL-encoded form body; the method is left unchanged.
    pub fn form<T: Serialize + ?Sized>(&mut self, form: &T) -> &mut Self {
        match serde_urlencoded::to_string(form) {
            Ok(encoded) => {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                self.body = Some(encoded.into());
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode form data");
                self.fail(BuildError::Request(format!("form body: {}", e)));
            }
        }
        self
    }

    /// Set the read timeout.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Clear or set the read timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Replace the `Authorization` header with a bearer token.
    pub fn bearer_auth(&mut self, token: impl AsRef<str>) -> &mut Self {
        self.set_header(header::AUTHORIZATION, format!("Bearer {}", token.as_ref()))
    }

    /// Replace the `Authorization` header with basic credentials.
    pub fn basic_auth(&mut self, username: impl AsRef<str>, password: Option<&str>) -> &mut Self {
        let value = basic_credentials(username.as_ref(), password);
        self.set_header(header::AUTHORIZATION, value)
    }

    /// Build a request from the current state.
    ///
    /// The builder stays usable, so the same builder can produce a request for
    /// every attempt of an exchange.
    pub fn build(&self) -> Result<Request> {
        if let Some(err) = &self.error {
            return Err(err.clone().into());
        }
        let uri = self
            .uri
            .clone()
            .ok_or_else(|| HttpClientError::RequestBuild("request URI is not set".to_string()))?;

        Ok(Request {
            method: self.method.clone(),
            uri,
            headers: self.headers.clone(),
            body: self.body.clone(),
            timeout: self.timeout,
        })
    }
}

fn header_pair<K, V>(name: K, value: V) -> std::result::Result<(HeaderName, HeaderValue), http::Error>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = HeaderName::try_from(name).map_err(Into::<http::Error>::into)?;
    let value = HeaderValue::try_from(value).map_err(Into::<http::Error>::into)?;
    Ok((name, value))
}

/// Encode a `Basic` authorization header value.
pub(crate) fn basic_credentials(username: &str, password: Option<&str>) -> String {
    use base64::Engine;
    let credentials = format!("{}:{}", username, password.unwrap_or_default());
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let request = Request::get("https://api.example.com/pods").unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.uri().as_str(), "https://api.example.com/pods");
        assert!(request.body().is_none());
        assert!(request.timeout().is_none());
    }

    #[test]
    fn test_header_multimap() {
        let mut builder = Request::builder();
        builder
            .uri("https://api.example.com")
            .header("Accept", "application/json")
            .header("accept", "text/plain")
            .header("X-Trace", "1");
        let request = builder.build().unwrap();

        assert_eq!(
            request.header_values("ACCEPT"),
            vec!["application/json", "text/plain"]
        );
        assert_eq!(request.header("x-trace"), Some("1"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut builder = Request::builder();
        builder
            .uri("https://api.example.com")
            .header("Accept", "a")
            .header("Accept", "b")
            .set_header("accept", "c");
        let request = builder.build().unwrap();
        assert_eq!(request.header_values("Accept"), vec!["c"]);
    }

    #[test]
    fn test_to_builder_is_independent() {
        let original = Request::get("https://api.example.com").unwrap();
        let mut builder = original.to_builder();
        builder.set_header("X-Extra", "yes");
        let changed = builder.build().unwrap();

        assert!(original.header("X-Extra").is_none());
        assert_eq!(changed.header("X-Extra"), Some("yes"));
    }

    #[test]
    fn test_post_sets_content_type() {
        let mut builder = Request::builder();
        builder
            .uri("https://api.example.com/items")
            .post("application/json", r#"{"a":1}"#);
        let request = builder.build().unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body().unwrap().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn test_json_and_form() {
        let mut builder = Request::builder();
        builder
            .uri("https://api.example.com/items")
            .method(Method::PUT)
            .json(&serde_json::json!({"name": "widget"}));
        let request = builder.build().unwrap();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.body().unwrap().as_ref(), br#"{"name":"widget"}"#);

        builder.form(&[("a", "1"), ("b", "two")]);
        let request = builder.build().unwrap();
        assert_eq!(
            request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(request.body().unwrap().as_ref(), b"a=1&b=two");
    }

    #[test]
    fn test_invalid_input_surfaces_on_build() {
        let mut builder = Request::builder();
        builder.uri("not a url");
        assert!(matches!(builder.build(), Err(HttpClientError::InvalidUrl(_))));

        let mut builder = Request::builder();
        builder
            .uri("https://api.example.com")
            .header("bad header", "value");
        assert!(matches!(
            builder.build(),
            Err(HttpClientError::RequestBuild(_))
        ));
    }

    #[test]
    fn test_missing_uri() {
        assert!(matches!(
            Request::builder().build(),
            Err(HttpClientError::RequestBuild(_))
        ));
    }

    #[test]
    fn test_auth_helpers() {
        let mut builder = Request::builder();
        builder.uri("https://api.example.com").bearer_auth("abc");
        assert_eq!(
            builder.build().unwrap().header("authorization"),
            Some("Bearer abc")
        );

        builder.basic_auth("user", Some("pass"));
        assert_eq!(
            builder.build().unwrap().header("authorization"),
            Some("Basic dXNlcjpwYXNz")
        );
    }
}
