//! The interceptor-mediated WebSocket handshake.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::exchange::apply_before;
use crate::transport::Handshake;
use crate::websocket::{Listener, ListenerAdapter, WebSocket};
use crate::{HttpClientError, InterceptorRegistry, Request, RequestBuilder, Result, Transport};

/// Run one handshake.
///
/// A rejection that carries a peer response goes through the same ordered
/// after-failure evaluation as an HTTP exchange; a resend is a complete new
/// upgrade attempt with a fresh listener adapter. A rejection that survives
/// every interceptor becomes [`HttpClientError::Handshake`]; connection-level
/// failures are returned unchanged.
pub(crate) async fn handshake(
    transport: &dyn Transport,
    interceptors: &InterceptorRegistry,
    mut builder: RequestBuilder,
    listener: Arc<dyn Listener>,
) -> Result<WebSocket> {
    let request = apply_before(interceptors, &mut builder)?;
    let mut outcome = attempt(transport, &request, &listener).await?;

    for (name, interceptor) in interceptors.iter() {
        let retry = match &outcome {
            Handshake::Rejected(rejection) => match rejection.response() {
                Some(response) => interceptor.after_failure(&mut builder, response),
                None => false,
            },
            Handshake::Open(_) => false,
        };
        if !retry {
            continue;
        }

        let request = apply_before(interceptors, &mut builder)?;
        debug!(interceptor = name, url = %request.uri(), "Interceptor requested a new handshake");
        let next = attempt(transport, &request, &listener).await?;
        outcome = chain(next, outcome);
    }

    match outcome {
        Handshake::Open(socket) => Ok(socket),
        Handshake::Rejected(rejection) => Err(HttpClientError::Handshake(rejection)),
    }
}

async fn attempt(
    transport: &dyn Transport,
    request: &Request,
    listener: &Arc<dyn Listener>,
) -> Result<Handshake> {
    trace!(url = %request.uri(), "Attempting WebSocket upgrade");
    let adapter = ListenerAdapter::new(Arc::clone(listener));
    transport.upgrade(request, adapter).await
}

/// Keep the rejection history when a retried handshake is rejected again.
fn chain(next: Handshake, replaced: Handshake) -> Handshake {
    match (next, replaced) {
        (Handshake::Rejected(mut rejection), Handshake::Rejected(previous)) => {
            if let (Some(response), Some(previous)) =
                (rejection.response_mut(), previous.into_response())
            {
                response.link_previous(previous);
            }
            Handshake::Rejected(rejection)
        }
        (next, _) => next,
    }
}
