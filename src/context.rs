use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, Method, StatusCode, Uri},
    response::Response,
};
use parking_lot::Mutex;

// ─── Per-request scope ───────────────────────────────────────────

/// Typed override slots shared between the timing middleware and the
/// layers nested inside it.
///
/// Lives in the request extensions as `Arc<RequestScope>`, so a write made by
/// an inner layer is still visible to the timing middleware after the
/// request itself has been consumed by the handler. Later writes replace
/// earlier ones, so a per-route key beats a router-wide default.
#[derive(Debug, Default)]
pub struct RequestScope {
    request_key: Mutex<Option<String>>,
    request_page: Mutex<Option<String>>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scope already attached to `req`, attaching a fresh one if
    /// there is none.
    pub fn attach(req: &mut Request) -> Arc<RequestScope> {
        if let Some(scope) = req.extensions().get::<Arc<RequestScope>>() {
            return scope.clone();
        }
        let scope = Arc::new(RequestScope::new());
        req.extensions_mut().insert(scope.clone());
        scope
    }

    /// Sets the metric identity override. The last write wins.
    pub fn set_request_key(&self, key: impl Into<String>) {
        let key = key.into();
        if let Some(previous) = self.request_key.lock().replace(key.clone()) {
            tracing::trace!(%previous, replaced_by = %key, "request key overridden");
        }
    }

    /// Sets the page label. The last write wins.
    pub fn set_request_page(&self, page: impl Into<String>) {
        let page = page.into();
        if let Some(previous) = self.request_page.lock().replace(page.clone()) {
            tracing::trace!(%previous, replaced_by = %page, "request page overridden");
        }
    }

    pub fn request_key(&self) -> Option<String> {
        self.request_key.lock().clone()
    }

    pub fn request_page(&self) -> Option<String> {
        self.request_page.lock().clone()
    }
}

// ─── Request snapshot ────────────────────────────────────────────

/// The parts of a request the timing middleware needs once the handler has
/// run. Taken before the request is handed down the stack.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub host: String,
    pub remote_addr: String,
}

impl RequestMeta {
    pub fn from_request(req: &Request) -> Self {
        let host = req
            .uri()
            .authority()
            .map(|a| a.as_str().to_owned())
            .or_else(|| {
                req.headers()
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_owned)
            })
            .unwrap_or_default();

        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            host,
            remote_addr,
        }
    }
}

// ─── Callback view ───────────────────────────────────────────────

/// Read-only view of a finished (or abandoned) request, handed to identity
/// resolvers and extra-tag callbacks.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    meta: &'a RequestMeta,
    scope: &'a RequestScope,
    response: Option<&'a Response>,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        meta: &'a RequestMeta,
        scope: &'a RequestScope,
        response: Option<&'a Response>,
    ) -> Self {
        Self {
            meta,
            scope,
            response,
        }
    }

    pub fn method(&self) -> &'a Method {
        &self.meta.method
    }

    pub fn uri(&self) -> &'a Uri {
        &self.meta.uri
    }

    pub fn path(&self) -> &'a str {
        self.meta.uri.path()
    }

    pub fn host(&self) -> &'a str {
        &self.meta.host
    }

    pub fn remote_addr(&self) -> &'a str {
        &self.meta.remote_addr
    }

    pub fn request_key(&self) -> Option<String> {
        self.scope.request_key()
    }

    pub fn request_page(&self) -> Option<String> {
        self.scope.request_page()
    }

    /// `None` when the request was cancelled before the handler returned.
    pub fn response(&self) -> Option<&'a Response> {
        self.response
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response.map(Response::status)
    }
}
