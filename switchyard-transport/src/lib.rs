//! # Switchyard Transport
//!
//! The network transport behind a Switchyard [`HttpClient`]: HTTP exchanges go
//! through `reqwest`, WebSocket upgrades through `tokio-tungstenite`.
//!
//! ## Features
//!
//! - **Body Modes**: Discarded, buffered, text and streaming responses
//! - **Basic Authentication**: Answers one `Basic` challenge per exchange when
//!   an [`Authenticator::Basic`] is configured
//! - **WebSocket Upgrades**: `http`/`https` URIs are upgraded as `ws`/`wss`;
//!   rejected upgrades surface the peer's response to the interceptors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use switchyard_client::{HttpClient, Request, Response};
//! use switchyard_transport::NetTransportFactory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::builder(NetTransportFactory)
//!         .connect_timeout(Duration::from_secs(10))
//!         .build()?;
//!
//!     let request = Request::get("https://api.example.com/healthz")?;
//!     let response: Response<String> = client.send_async(&request).await?;
//!     println!("{}: {}", response.status(), response.body());
//!     Ok(())
//! }
//! ```
//!
//! [`HttpClient`]: switchyard_client::HttpClient
//! [`Authenticator::Basic`]: switchyard_client::Authenticator::Basic

mod exchange;
mod transport;
mod websocket;

pub use transport::{NetTransport, NetTransportFactory};
