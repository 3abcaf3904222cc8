//! HTTP exchanges over reqwest.

use futures::TryStreamExt;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, StatusCode};
use std::io;
use std::time::Duration;
use switchyard_client::{
    Authenticator, Body, BodyMode, BodyStream, HttpClientError, Request, Response, Result,
};
use tracing::{debug, trace};

use crate::NetTransport;

impl NetTransport {
    /// Send one request, answering a basic authentication challenge at most
    /// once when a basic authenticator is configured.
    pub(crate) async fn exchange(&self, request: &Request, mode: BodyMode) -> Result<Response<Body>> {
        let response = self.execute(request, mode).await?;

        let Some(retry) = self.answer_challenge(request, &response) else {
            return self.read_body(request, response, mode).await;
        };

        debug!(url = %request.uri(), "Answering basic authentication challenge");
        let challenged = Response::new(response.status(), request.clone(), ())
            .with_headers(response.headers().clone());
        drop(response);

        let response = self.execute(&retry, mode).await?;
        let response = self.read_body(&retry, response, mode).await?;
        Ok(response.with_previous(challenged))
    }

    async fn execute(&self, request: &Request, mode: BodyMode) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.uri().clone())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        // A streamed body may outlive the timeout; only the response head is bounded.
        let timeout = request.timeout();
        if let Some(timeout) = timeout
            && mode != BodyMode::Stream
        {
            builder = builder.timeout(timeout);
        }

        trace!(method = %request.method(), url = %request.uri(), ?mode, "Executing request");
        let pending = builder.send();
        let result = match timeout {
            Some(timeout) if mode == BodyMode::Stream => tokio::time::timeout(timeout, pending)
                .await
                .map_err(|_| HttpClientError::Timeout(timeout))?,
            _ => pending.await,
        };
        result.map_err(|e| self.map_error(e, timeout))
    }

    async fn read_body(
        &self,
        request: &Request,
        response: reqwest::Response,
        mode: BodyMode,
    ) -> Result<Response<Body>> {
        let status = response.status();
        let headers = response.headers().clone();
        let timeout = request.timeout();

        let body = match mode {
            BodyMode::Discard => {
                response.bytes().await.map_err(|e| self.map_error(e, timeout))?;
                Body::Empty
            }
            BodyMode::Bytes => Body::Bytes(
                response
                    .bytes()
                    .await
                    .map_err(|e| self.map_error(e, timeout))?,
            ),
            BodyMode::Text => Body::Text(
                response
                    .text()
                    .await
                    .map_err(|e| self.map_error(e, timeout))?,
            ),
            BodyMode::Stream => Body::Stream(BodyStream::new(
                response.bytes_stream().map_err(io::Error::other),
            )),
        };

        Ok(Response::new(status, request.clone(), body).with_headers(headers))
    }

    fn answer_challenge(&self, request: &Request, response: &reqwest::Response) -> Option<Request> {
        let Some(Authenticator::Basic { username, password }) = self.config.authenticator.as_ref()
        else {
            return None;
        };
        if response.status() != StatusCode::UNAUTHORIZED
            || request.headers().contains_key(AUTHORIZATION)
            || !is_basic_challenge(response.headers())
        {
            return None;
        }

        let mut builder = request.to_builder();
        builder.basic_auth(username, Some(password.as_str()));
        builder.build().ok()
    }

    fn map_error(&self, error: reqwest::Error, timeout: Option<Duration>) -> HttpClientError {
        if error.is_timeout() {
            let limit = timeout.or(self.config.connect_timeout).unwrap_or_default();
            HttpClientError::Timeout(limit)
        } else if error.is_connect() {
            HttpClientError::Connection(error.to_string())
        } else if error.is_builder() {
            HttpClientError::RequestBuild(error.to_string())
        } else {
            HttpClientError::transport(error)
        }
    }
}

fn is_basic_challenge(headers: &HeaderMap) -> bool {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| {
            v.trim_start()
                .get(..5)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_basic_challenge_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_basic_challenge(&headers));

        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"api\""));
        assert!(!is_basic_challenge(&headers));

        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static("basic realm=\"cluster\""));
        assert!(is_basic_challenge(&headers));
    }
}
