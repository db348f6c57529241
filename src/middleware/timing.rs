use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::Rover;
use crate::context::{RequestContext, RequestMeta, RequestScope};

/// Times the rest of the stack and emits one sample per request to the
/// configured sink.
///
/// The response is returned exactly as the inner service produced it; sink
/// failures are logged, never surfaced.
///
///   router.layer(axum::middleware::from_fn_with_state(rover, timing_middleware))
pub async fn timing_middleware(
    State(rover): State<Rover>,
    mut req: Request,
    next: Next,
) -> Response {
    let scope = RequestScope::attach(&mut req);
    let meta = RequestMeta::from_request(&req);

    let in_flight = InFlight::start(rover, meta, scope);
    let response = next.run(req).await;
    in_flight.finish(&response);

    response
}

// ─── In-flight guard ─────────────────────────────────────────────

/// Owns the per-request timing state. If the request future is dropped
/// before the handler returns, the guard still emits a sample (with no
/// response) covering the time up to the drop.
struct InFlight {
    rover: Rover,
    meta: RequestMeta,
    scope: Arc<RequestScope>,
    start: Instant,
    finished: bool,
}

impl InFlight {
    fn start(rover: Rover, meta: RequestMeta, scope: Arc<RequestScope>) -> Self {
        Self {
            rover,
            meta,
            scope,
            start: Instant::now(),
            finished: false,
        }
    }

    fn finish(mut self, response: &Response) {
        let elapsed = self.start.elapsed();
        self.finished = true;
        let ctx = RequestContext::new(&self.meta, &self.scope, Some(response));
        self.rover.record(&ctx, elapsed);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.finished || std::thread::panicking() {
            return;
        }
        let elapsed = self.start.elapsed();
        tracing::debug!(path = self.meta.uri.path(), "request dropped before handler returned");
        let ctx = RequestContext::new(&self.meta, &self.scope, None);
        self.rover.record(&ctx, elapsed);
    }
}
