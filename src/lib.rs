// Switchyard - An interceptor-driven HTTP and WebSocket client for Rust
//
// Every request and WebSocket handshake passes through an ordered chain of
// named interceptors that can rewrite the request and trigger resends.

// Re-export the client pipeline
pub use switchyard_client::*;

// Re-export the network transport
#[cfg(feature = "transport")]
pub use switchyard_transport::{NetTransport, NetTransportFactory};

/// Create a client builder backed by the network transport.
///
/// ```rust,no_run
/// use switchyard::{AuthInterceptor, Request, Response};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = switchyard::builder()
///         .interceptor("auth", AuthInterceptor::bearer("my-token"))
///         .build()?;
///
///     let request = Request::get("https://api.example.com/users")?;
///     let response: Response<String> = client.send_async(&request).await?;
///     println!("{}", response.body());
///     Ok(())
/// }
/// ```
#[cfg(feature = "transport")]
pub fn builder() -> HttpClientBuilder {
    HttpClient::builder(NetTransportFactory)
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use switchyard_client::prelude::*;

    #[cfg(feature = "transport")]
    pub use switchyard_transport::NetTransportFactory;
}
