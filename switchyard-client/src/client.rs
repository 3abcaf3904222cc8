//! HTTP client implementation.

use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tracing::debug;

use crate::body::ResponseBody;
use crate::websocket::{Listener, WebSocket, WebSocketBuilder};
use crate::{
    exchange, handshake, Authenticator, HttpClientConfig, HttpClientError, Interceptor,
    InterceptorRegistry, Request, RequestBuilder, Response, Result, Transport,
};

/// Creates the transport for a client from its configuration.
pub trait TransportFactory: Send + Sync {
    /// Build a transport honouring `config`.
    fn create(&self, config: &HttpClientConfig) -> Result<Arc<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&HttpClientConfig) -> Result<Arc<dyn Transport>> + Send + Sync,
{
    fn create(&self, config: &HttpClientConfig) -> Result<Arc<dyn Transport>> {
        self(config)
    }
}

struct FixedTransport(Arc<dyn Transport>);

impl TransportFactory for FixedTransport {
    fn create(&self, _config: &HttpClientConfig) -> Result<Arc<dyn Transport>> {
        Ok(Arc::clone(&self.0))
    }
}

/// HTTP client that runs every request and WebSocket handshake through its
/// interceptors.
///
/// Cloning is cheap; clones share the transport and the interceptor snapshot.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: Arc<HttpClientConfig>,
    interceptors: Arc<InterceptorRegistry>,
    factory: Arc<dyn TransportFactory>,
    runtime: Arc<BlockingRuntime>,
}

impl HttpClient {
    /// Create a client builder using the given transport factory.
    pub fn builder(factory: impl TransportFactory + 'static) -> HttpClientBuilder {
        HttpClientBuilder::new(factory)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the interceptors every exchange of this client uses.
    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// Derive a builder with this client's configuration and interceptors.
    ///
    /// Changes to the derived builder never affect this client.
    pub fn new_builder(&self) -> HttpClientBuilder {
        HttpClientBuilder {
            config: (*self.config).clone(),
            interceptors: (*self.interceptors).clone(),
            factory: Arc::clone(&self.factory),
        }
    }

    /// Create a request builder carrying the configured read timeout.
    pub fn new_request_builder(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::new();
        builder.set_timeout(self.config.read_timeout);
        builder
    }

    /// Create a WebSocket builder carrying the configured read timeout.
    pub fn new_web_socket_builder(&self) -> WebSocketBuilder {
        WebSocketBuilder::new(self.clone(), self.config.read_timeout)
    }

    /// Send a request, decoding the body as `T`.
    ///
    /// Unsuccessful status codes are returned as normal responses once no
    /// interceptor wants to resend. Only transport failures are errors.
    pub async fn send_async<T: ResponseBody>(&self, request: &Request) -> Result<Response<T>> {
        let interceptors = Arc::clone(&self.interceptors);
        let response =
            exchange::exchange(self.transport.as_ref(), &interceptors, request, T::MODE).await?;
        response.decode()
    }

    /// Send a request and block the calling thread until it completes.
    ///
    /// The exchange runs as a background task. Any failure is reported as an
    /// I/O error whose inner error is the original cause; a task that panics
    /// or is cancelled yields [`io::ErrorKind::Interrupted`]. Abandoning the
    /// wait does not cancel the task.
    pub fn send<T: ResponseBody>(&self, request: &Request) -> io::Result<Response<T>> {
        let client = self.clone();
        let request = request.clone();
        let task = async move { client.send_async::<T>(&request).await };

        let joined = match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                let join = handle.spawn(task);
                tokio::task::block_in_place(|| futures::executor::block_on(join))
            }
            _ => {
                let join = self.runtime.get()?.spawn(task);
                futures::executor::block_on(join)
            }
        };

        match joined {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(HttpClientError::Io(e))) => Err(e),
            Ok(Err(e)) => Err(io::Error::other(e)),
            Err(e) => Err(io::Error::new(io::ErrorKind::Interrupted, e)),
        }
    }

    pub(crate) async fn handshake(
        &self,
        builder: RequestBuilder,
        listener: Arc<dyn Listener>,
    ) -> Result<WebSocket> {
        let interceptors = Arc::clone(&self.interceptors);
        handshake::handshake(self.transport.as_ref(), &interceptors, builder, listener).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

/// Runtime for blocking sends made outside a multi-threaded tokio runtime.
/// A current-thread runtime cannot drive the exchange while its only thread
/// is blocked waiting for it.
///
/// Built on first use and shut down in the background on drop, so dropping a
/// client inside an async context is safe.
#[derive(Default)]
struct BlockingRuntime {
    runtime: OnceLock<Runtime>,
}

impl BlockingRuntime {
    fn get(&self) -> io::Result<&Runtime> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("switchyard-blocking")
            .enable_all()
            .build()?;
        debug!("Started runtime for blocking sends");
        // A concurrent initializer may have won; the spare runtime is dropped.
        Ok(self.runtime.get_or_init(|| runtime))
    }
}

impl Drop for BlockingRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Builder for [`HttpClient`].
#[derive(Clone)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    interceptors: InterceptorRegistry,
    factory: Arc<dyn TransportFactory>,
}

impl HttpClientBuilder {
    /// Create a builder whose clients get their transport from `factory`.
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self {
            config: HttpClientConfig::default(),
            interceptors: InterceptorRegistry::new(),
            factory: Arc::new(factory),
        }
    }

    /// Create a builder whose clients all share one transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self::new(FixedTransport(transport))
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: HttpClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the default read timeout of new requests.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Set the write timeout. Accepted but not enforced.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = Some(timeout);
        self
    }

    /// Mark the client as used for streaming.
    pub fn for_streaming(mut self) -> Self {
        self.config.streaming = true;
        self
    }

    /// Set the authenticator.
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.config.authenticator = Some(authenticator);
        self
    }

    /// Never answer authentication challenges.
    pub fn authenticator_none(self) -> Self {
        self.authenticator(Authenticator::None)
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Insert, replace or remove (`None`) a named interceptor.
    pub fn add_or_replace_interceptor(
        mut self,
        name: impl Into<String>,
        interceptor: Option<Arc<dyn Interceptor>>,
    ) -> Self {
        self.interceptors.add_or_replace(name, interceptor);
        self
    }

    /// Insert or replace a named interceptor.
    pub fn interceptor(self, name: impl Into<String>, interceptor: impl Interceptor + 'static) -> Self {
        self.add_or_replace_interceptor(name, Some(Arc::new(interceptor)))
    }

    /// Remove a named interceptor.
    pub fn remove_interceptor(self, name: impl Into<String>) -> Self {
        self.add_or_replace_interceptor(name, None)
    }

    /// Get the configuration built so far.
    pub fn current_config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Get the interceptors registered so far.
    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpClient> {
        let transport = self.factory.create(&self.config)?;
        debug!(
            interceptors = ?self.interceptors,
            connect_timeout = ?self.config.connect_timeout,
            read_timeout = ?self.config.read_timeout,
            "Built HTTP client"
        );
        Ok(HttpClient {
            transport,
            config: Arc::new(self.config),
            interceptors: Arc::new(self.interceptors),
            factory: self.factory,
            runtime: Arc::new(BlockingRuntime::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyMode};
    use crate::transport::Handshake;
    use crate::websocket::ListenerAdapter;
    use crate::LoggingInterceptor;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::StatusCode;
    use parking_lot::Mutex;

    /// Answers every request with a fixed status, or a fixed error.
    struct Canned {
        status: StatusCode,
        fail_with: Option<fn() -> HttpClientError>,
        seen: Mutex<Vec<(Option<Duration>, BodyMode)>>,
    }

    impl Canned {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::OK,
                fail_with: None,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(error: fn() -> HttpClientError) -> Arc<Self> {
            Arc::new(Self {
                status: StatusCode::OK,
                fail_with: Some(error),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, request: &Request, mode: BodyMode) -> Result<Response<Body>> {
            self.seen.lock().push((request.timeout(), mode));
            if let Some(error) = self.fail_with {
                return Err(error());
            }
            let body = match mode {
                BodyMode::Discard => Body::Empty,
                BodyMode::Bytes => Body::Bytes(Bytes::from_static(b"payload")),
                BodyMode::Text => Body::Text("payload".into()),
                BodyMode::Stream => Body::Stream(crate::BodyStream::from_bytes("payload")),
            };
            Ok(Response::new(self.status, request.clone(), body))
        }

        async fn upgrade(&self, _request: &Request, _listener: ListenerAdapter) -> Result<Handshake> {
            Err(HttpClientError::Connection("no upgrades".into()))
        }
    }

    fn client(transport: Arc<Canned>) -> HttpClient {
        HttpClientBuilder::with_transport(transport)
            .read_timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[test]
    fn test_request_builder_carries_read_timeout() {
        let client = client(Canned::ok());
        let mut builder = client.new_request_builder();
        let request = builder.uri("http://localhost/").build().unwrap();
        assert_eq!(request.timeout(), Some(Duration::from_secs(5)));

        let socket = client
            .new_web_socket_builder()
            .uri("ws://localhost/watch");
        assert_eq!(
            socket.request().build().unwrap().timeout(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_derived_builder_is_independent() {
        let client = HttpClientBuilder::with_transport(Canned::ok())
            .interceptor("a", LoggingInterceptor::new())
            .interceptor("b", LoggingInterceptor::new())
            .build()
            .unwrap();

        let derived = client
            .new_builder()
            .remove_interceptor("a")
            .interceptor("c", LoggingInterceptor::new())
            .build()
            .unwrap();

        let names: Vec<_> = client.interceptors().names().collect();
        assert_eq!(names, vec!["a", "b"]);
        let names: Vec<_> = derived.interceptors().names().collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_factory_sees_config() {
        let factory = |config: &HttpClientConfig| -> Result<Arc<dyn Transport>> {
            assert_eq!(config.connect_timeout, Some(Duration::from_secs(2)));
            assert!(config.streaming);
            let transport: Arc<dyn Transport> = Canned::ok();
            Ok(transport)
        };
        let client = HttpClient::builder(factory)
            .connect_timeout(Duration::from_secs(2))
            .for_streaming()
            .build()
            .unwrap();
        assert!(client.config().streaming);
    }

    #[tokio::test]
    async fn test_send_async_requests_body_mode() {
        let transport = Canned::ok();
        let client = client(transport.clone());
        let request = client
            .new_request_builder()
            .uri("http://localhost/")
            .build()
            .unwrap();

        let text: Response<String> = client.send_async(&request).await.unwrap();
        assert_eq!(text.body(), "payload");
        let bytes: Response<Bytes> = client.send_async(&request).await.unwrap();
        assert_eq!(bytes.body().as_ref(), b"payload");
        let _: Response<()> = client.send_async(&request).await.unwrap();

        let modes: Vec<_> = transport.seen.lock().iter().map(|(_, mode)| *mode).collect();
        assert_eq!(modes, vec![BodyMode::Text, BodyMode::Bytes, BodyMode::Discard]);
    }

    #[test]
    fn test_blocking_send_without_runtime() {
        let client = client(Canned::ok());
        let request = Request::get("http://localhost/").unwrap();
        let response: Response<String> = tokio_test::assert_ok!(client.send(&request));
        assert_eq!(response.code(), 200);
        assert_eq!(response.body(), "payload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_send_inside_runtime() {
        let client = client(Canned::ok());
        let request = Request::get("http://localhost/").unwrap();
        let response: Response<()> = client.send(&request).unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_blocking_send_inside_current_thread_runtime() {
        let client = client(Canned::ok());
        let request = Request::get("http://localhost/").unwrap();
        let response: Response<Bytes> = client.send(&request).unwrap();
        assert_eq!(response.body().len(), 7);
    }

    #[test]
    fn test_blocking_send_wraps_failures() {
        let client = client(Canned::failing(|| {
            HttpClientError::Connection("refused".into())
        }));
        let request = Request::get("http://localhost/").unwrap();

        let error = tokio_test::assert_err!(client.send::<String>(&request));
        assert_eq!(error.kind(), io::ErrorKind::Other);
        let cause = error
            .get_ref()
            .and_then(|e| e.downcast_ref::<HttpClientError>())
            .unwrap();
        assert!(cause.is_connection());
    }

    #[test]
    fn test_blocking_send_passes_io_errors_through() {
        let client = client(Canned::failing(|| {
            HttpClientError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }));
        let request = Request::get("http://localhost/").unwrap();

        let error = tokio_test::assert_err!(client.send::<()>(&request));
        assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
    }
}
