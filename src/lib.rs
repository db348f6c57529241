//! Per-request timing metrics for axum.
//!
//! [`Rover`] wraps a handler pipeline, times every request, derives a metric
//! identity and a tag set for it, and hands one [`TimingSample`] per request
//! to a [`MetricsSink`].
//!
//! ```ignore
//! let rover = Rover::new(sink).with_extra_tags(|ctx: &RequestContext<'_>| {
//!     ctx.status().map(|s| vec![tag("http:status", s.as_str())]).unwrap_or_default()
//! });
//!
//! let app = Router::new()
//!     .route(
//!         "/users",
//!         get(list_users).route_layer(from_fn_with_state(
//!             RequestKey::new("get.list_users.timing"),
//!             set_request_key,
//!         )),
//!     )
//!     .layer(from_fn_with_state(rover, timing_middleware));
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod sink;
pub mod tag;
pub mod tags;

pub use config::{Rover, SAMPLE_RATE};
pub use context::{RequestContext, RequestMeta, RequestScope};
pub use error::SinkError;
pub use identity::{IdentityResolver, PathIdentity};
pub use middleware::request_key::{set_request_key, set_request_page, RequestKey, RequestPage};
pub use middleware::timing::timing_middleware;
pub use sink::{noop_sink, MetricsSink, NoopSink, SinkHandle, TimingSample};
pub use tag::tag;
pub use tags::ExtraTags;
