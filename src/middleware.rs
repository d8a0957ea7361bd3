//! Request ID middleware for correlating logs with requests.
//!
//! Every inbound request gets a UUID v4 and a tracing span wrapping its whole
//! lifecycle, so the interleaved logs of concurrent blocking scenarios can be
//! told apart.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Request ID stored in request extensions for handlers that want it.
#[derive(Clone, Debug)]
pub struct RequestId(pub Uuid);

/// Outermost middleware layer: opens the per-request span and records the
/// response status and duration on completion.
pub async fn request_id_layer(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    request.extensions_mut().insert(RequestId(request_id));
    let start = Instant::now();

    async move {
        let response = next.run(request).await;
        tracing::info!(
            status = response.status().as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}
