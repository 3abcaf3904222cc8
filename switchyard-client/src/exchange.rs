//! The interceptor-mediated HTTP exchange.

use tracing::{debug, trace};

use crate::body::{Body, BodyMode};
use crate::{InterceptorRegistry, Request, RequestBuilder, Response, Result, Transport};

/// Run every before-hook in registry order and derive the request to send.
///
/// Each hook sees the request produced by the hooks before it.
pub(crate) fn apply_before(
    interceptors: &InterceptorRegistry,
    builder: &mut RequestBuilder,
) -> Result<Request> {
    let mut current = builder.build()?;
    for interceptor in interceptors.values() {
        interceptor.before(builder, &current);
        current = builder.build()?;
    }
    Ok(current)
}

/// Run one exchange.
///
/// After the first send, each interceptor in turn may ask to resend when the
/// current response is unsuccessful. The decision of every interceptor is made
/// against the outcome of all earlier ones, so there are at most as many
/// resends as interceptors. Transport errors end the exchange immediately.
pub(crate) async fn exchange(
    transport: &dyn Transport,
    interceptors: &InterceptorRegistry,
    request: &Request,
    mode: BodyMode,
) -> Result<Response<Body>> {
    let mut builder = request.to_builder();
    let current = apply_before(interceptors, &mut builder)?;
    trace!(method = %current.method(), url = %current.uri(), "Sending request");
    let mut response = transport.send(&current, mode).await?;

    for (name, interceptor) in interceptors.iter() {
        if response.is_success() || !interceptor.after_failure(&mut builder, &response) {
            continue;
        }

        let retry = apply_before(interceptors, &mut builder)?;
        debug!(
            interceptor = name,
            status = %response.status(),
            url = %retry.uri(),
            "Interceptor requested a resend"
        );
        let mut next = transport.send(&retry, mode).await?;
        next.link_previous(response);
        response = next;
    }

    Ok(response)
}
