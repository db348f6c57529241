use clap::Parser;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rover::sink::{BackgroundSink, HistogramSink};
use rover::{tag, RequestContext, Rover};

mod handlers;
mod server;
mod settings;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// In-memory user store backing the demo API.
    pub users: RwLock<HashMap<String, handlers::users::User>>,

    /// Everything the timing layer has recorded, for `/api/metrics`.
    pub metrics: Arc<HistogramSink>,
}

/// `http:status:<code>` once the handler has produced a response, and the
/// page label when one was set.
fn demo_tags(ctx: &RequestContext<'_>) -> Vec<String> {
    let mut tags = Vec::with_capacity(2);
    if let Some(status) = ctx.status() {
        tags.push(tag("http:status", status.as_str()));
    }
    if let Some(page) = ctx.request_page() {
        tags.push(tag("page", &page));
    }
    tags
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = settings::Settings::parse();

    // ── 1. Sinks: histogram behind a background queue ────────────
    let metrics = Arc::new(HistogramSink::new());
    let (sink, drain) = BackgroundSink::spawn(metrics.clone(), settings.queue_capacity);

    // ── 2. Timing configuration ─────────────────────────────────
    let rover = Rover::new(Arc::new(sink)).with_extra_tags(demo_tags);

    // ── 3. Shared state + router ────────────────────────────────
    let state = Arc::new(AppState {
        users: RwLock::new(HashMap::new()),
        metrics,
    });
    let app = server::create_router(state, rover);

    // ── 4. Bind & serve ─────────────────────────────────────────
    let listener = match tokio::net::TcpListener::bind(settings.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(listen = %settings.listen, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(listen = %settings.listen, "rover demo listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "server exited with error");
    }

    // The router (and with it every sink handle) is gone; flush the queue.
    if let Err(e) = drain.await {
        tracing::warn!(error = %e, "metrics drain task failed");
    }
    tracing::info!("shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
