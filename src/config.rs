use std::sync::Arc;
use std::time::Duration;

use crate::context::RequestContext;
use crate::identity::{resolve_identity, IdentityResolver, PathIdentity};
use crate::sink::{SinkHandle, TimingSample};
use crate::tags::{collect_tags, ExtraTags};

/// Every request is recorded; there is no sampling.
pub const SAMPLE_RATE: f64 = 1.0;

/// Timing middleware configuration: where samples go and how they are named
/// and tagged.
///
/// Cheap to clone; all clones share the same sink and callbacks. Immutable
/// once built, so reconfiguring means building a new one.
#[derive(Clone)]
pub struct Rover {
    inner: Arc<Inner>,
}

struct Inner {
    sink: SinkHandle,

    /// Produces the identity when no request key was set on the request.
    /// Defaults to the request path.
    resolver: Arc<dyn IdentityResolver>,

    /// Extra tags appended after `http:host`, `http:method` and
    /// `http:remote-addr`. Invoked after the handler has completed.
    extra_tags: Option<Arc<dyn ExtraTags>>,
}

impl Rover {
    /// Path-based identities, no extra tags.
    pub fn new(sink: SinkHandle) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                resolver: Arc::new(PathIdentity),
                extra_tags: None,
            }),
        }
    }

    pub fn with_sink(self, sink: SinkHandle) -> Self {
        self.rebuild(|inner| inner.sink = sink)
    }

    pub fn with_identity_resolver(self, resolver: impl IdentityResolver + 'static) -> Self {
        let resolver: Arc<dyn IdentityResolver> = Arc::new(resolver);
        self.rebuild(|inner| inner.resolver = resolver)
    }

    pub fn with_extra_tags(self, extra_tags: impl ExtraTags + 'static) -> Self {
        let extra_tags: Arc<dyn ExtraTags> = Arc::new(extra_tags);
        self.rebuild(|inner| inner.extra_tags = Some(extra_tags))
    }

    fn rebuild(self, f: impl FnOnce(&mut Inner)) -> Self {
        let mut inner = Inner {
            sink: self.inner.sink.clone(),
            resolver: self.inner.resolver.clone(),
            extra_tags: self.inner.extra_tags.clone(),
        };
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn sink(&self) -> &SinkHandle {
        &self.inner.sink
    }

    /// Resolve identity and tags for a finished request and hand one sample
    /// to the sink. Sink failures are logged and swallowed.
    pub fn record(&self, ctx: &RequestContext<'_>, elapsed: Duration) {
        let identity = resolve_identity(self.inner.resolver.as_ref(), ctx);
        let tags = collect_tags(self.inner.extra_tags.as_deref(), ctx);

        tracing::debug!(
            %identity,
            elapsed_us = elapsed.as_micros() as u64,
            status = ctx.status().map(|s| s.as_u16()),
            "request timed"
        );

        let sample = TimingSample {
            identity: identity.clone(),
            duration: elapsed,
            tags,
            sample_rate: SAMPLE_RATE,
        };
        if let Err(e) = self.inner.sink.timing(sample) {
            tracing::warn!(%identity, error = %e, "failed to emit timing sample");
        }
    }
}

impl std::fmt::Debug for Rover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rover")
            .field("extra_tags", &self.inner.extra_tags.is_some())
            .finish_non_exhaustive()
    }
}
