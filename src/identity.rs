use crate::context::RequestContext;

/// Produces the metric identity for a request that carries no explicit
/// override.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, ctx: &RequestContext<'_>) -> String;
}

/// Default resolver: the request path, verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathIdentity;

impl IdentityResolver for PathIdentity {
    fn resolve(&self, ctx: &RequestContext<'_>) -> String {
        ctx.path().to_owned()
    }
}

impl<F> IdentityResolver for F
where
    F: Fn(&RequestContext<'_>) -> String + Send + Sync,
{
    fn resolve(&self, ctx: &RequestContext<'_>) -> String {
        self(ctx)
    }
}

/// Override on the request scope, else `resolver`.
pub fn resolve_identity(resolver: &dyn IdentityResolver, ctx: &RequestContext<'_>) -> String {
    match ctx.request_key() {
        Some(key) => key,
        None => resolver.resolve(ctx),
    }
}
