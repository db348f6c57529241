use crate::context::RequestContext;
use crate::tag::tag;

/// Caller-supplied tags, computed after the handler has returned so they can
/// look at the response.
pub trait ExtraTags: Send + Sync {
    fn extra_tags(&self, ctx: &RequestContext<'_>) -> Vec<String>;
}

impl<F> ExtraTags for F
where
    F: Fn(&RequestContext<'_>) -> Vec<String> + Send + Sync,
{
    fn extra_tags(&self, ctx: &RequestContext<'_>) -> Vec<String> {
        self(ctx)
    }
}

/// `http:host`, `http:method`, `http:remote-addr`, then whatever `extra`
/// returns, in its order. No deduplication.
pub fn collect_tags(extra: Option<&dyn ExtraTags>, ctx: &RequestContext<'_>) -> Vec<String> {
    let mut tags = vec![
        tag("http:host", ctx.host()),
        tag("http:method", ctx.method().as_str()),
        tag("http:remote-addr", ctx.remote_addr()),
    ];
    if let Some(extra) = extra {
        tags.extend(extra.extra_tags(ctx));
    }
    tags
}
