use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::context::RequestScope;

/// Static metric identity for a route, e.g. `"get.list_users.timing"`.
#[derive(Debug, Clone)]
pub struct RequestKey(Arc<str>);

impl RequestKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }
}

/// Static page label for a route.
#[derive(Debug, Clone)]
pub struct RequestPage(Arc<str>);

impl RequestPage {
    pub fn new(page: impl Into<Arc<str>>) -> Self {
        Self(page.into())
    }
}

/// Stamps a request key onto the request so the timing middleware uses it in
/// place of the resolver. Works on either side of the timing layer:
///
/// ```ignore
/// .route(
///     "/users",
///     get(list_users).route_layer(from_fn_with_state(
///         RequestKey::new("get.list_users.timing"),
///         set_request_key,
///     )),
/// )
/// ```
pub async fn set_request_key(
    State(key): State<RequestKey>,
    mut req: Request,
    next: Next,
) -> Response {
    RequestScope::attach(&mut req).set_request_key(&*key.0);
    next.run(req).await
}

/// Stamps a page label onto the request for extra-tag callbacks to read.
pub async fn set_request_page(
    State(page): State<RequestPage>,
    mut req: Request,
    next: Next,
) -> Response {
    RequestScope::attach(&mut req).set_request_page(&*page.0);
    next.run(req).await
}
