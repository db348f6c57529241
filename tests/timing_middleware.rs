//! End-to-end tests for the timing layer.
//!
//! Each test serves a small router on 127.0.0.1:0 and talks raw HTTP/1.1 to
//! it, so `ConnectInfo` (and therefore `http:remote-addr`) is real.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use rover::middleware::request_key::RequestKey;
use rover::{
    set_request_key, timing_middleware, MetricsSink, RequestContext, Rover, SinkError,
    TimingSample, SAMPLE_RATE,
};

// ─── Test sinks ──────────────────────────────────────────────────

#[derive(Default)]
struct CaptureSink {
    samples: Mutex<Vec<TimingSample>>,
}

impl CaptureSink {
    fn take(&self) -> Vec<TimingSample> {
        std::mem::take(&mut *self.samples.lock())
    }
}

impl MetricsSink for CaptureSink {
    fn timing(&self, sample: TimingSample) -> Result<(), SinkError> {
        self.samples.lock().push(sample);
        Ok(())
    }
}

struct FailingSink {
    calls: AtomicUsize,
}

impl MetricsSink for FailingSink {
    fn timing(&self, _sample: TimingSample) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Transport("statsd unreachable".into()))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Sends `GET path` and returns the raw response plus the client's own
/// address (which the server sees as the remote address).
async fn get_raw(addr: SocketAddr, path: &str) -> (String, SocketAddr) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let client = stream.local_addr().unwrap();

    let request = format!("GET {path} HTTP/1.1\r\nHost: test.local\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    (response, client)
}

fn body(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body)
        .unwrap_or("")
}

fn with_timing(router: Router, rover: Rover) -> Router {
    router.layer(from_fn_with_state(rover, timing_middleware))
}

// ─── Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn path_is_the_default_identity() {
    let sink = Arc::new(CaptureSink::default());
    let app = with_timing(
        Router::new().route("/users", get(|| async { "ok" })),
        Rover::new(sink.clone()),
    );
    let addr = serve(app).await;

    let (response, client) = get_raw(addr, "/users?limit=5").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");

    let samples = sink.take();
    assert_eq!(samples.len(), 1);
    let sample = &samples[0];
    assert_eq!(sample.identity, "/users");
    assert_eq!(sample.sample_rate, SAMPLE_RATE);
    assert_eq!(sample.sample_rate, 1.0);
    assert_eq!(
        sample.tags,
        vec![
            "http:host:test.local".to_owned(),
            "http:method:GET".to_owned(),
            format!("http:remote-addr:{client}"),
        ]
    );
}

#[tokio::test]
async fn route_key_overrides_path_and_resolver() {
    let sink = Arc::new(CaptureSink::default());
    let rover = Rover::new(sink.clone())
        .with_identity_resolver(|ctx: &RequestContext<'_>| format!("resolved{}", ctx.path()));
    let app = with_timing(
        Router::new()
            .route(
                "/users",
                get(|| async { "listed" }).route_layer(from_fn_with_state(
                    RequestKey::new("get.list_users.timing"),
                    set_request_key,
                )),
            )
            .route("/health", get(|| async { "up" })),
        rover,
    );
    let addr = serve(app).await;

    get_raw(addr, "/users").await;
    get_raw(addr, "/health").await;

    let identities: Vec<String> = sink.take().into_iter().map(|s| s.identity).collect();
    assert_eq!(identities, ["get.list_users.timing", "resolved/health"]);
}

#[tokio::test]
async fn key_set_outside_the_timing_layer_is_honoured() {
    let sink = Arc::new(CaptureSink::default());
    let app = with_timing(
        Router::new().route("/users", get(|| async { "ok" })),
        Rover::new(sink.clone()),
    )
    .layer(from_fn_with_state(
        RequestKey::new("outer.key"),
        set_request_key,
    ));
    let addr = serve(app).await;

    get_raw(addr, "/users").await;

    assert_eq!(sink.take()[0].identity, "outer.key");
}

#[tokio::test]
async fn route_key_beats_router_wide_default() {
    let sink = Arc::new(CaptureSink::default());
    let router = Router::new()
        .route(
            "/users",
            get(|| async { "listed" }).route_layer(from_fn_with_state(
                RequestKey::new("get.list_users.timing"),
                set_request_key,
            )),
        )
        .route("/health", get(|| async { "up" }))
        .layer(from_fn_with_state(
            RequestKey::new("global.default"),
            set_request_key,
        ));
    let addr = serve(with_timing(router, Rover::new(sink.clone()))).await;

    get_raw(addr, "/users").await;
    get_raw(addr, "/health").await;

    let identities: Vec<String> = sink.take().into_iter().map(|s| s.identity).collect();
    assert_eq!(identities, ["get.list_users.timing", "global.default"]);
}

#[tokio::test]
async fn extra_tags_are_appended_after_the_defaults() {
    let sink = Arc::new(CaptureSink::default());
    let rover = Rover::new(sink.clone()).with_extra_tags(|ctx: &RequestContext<'_>| {
        let mut tags = vec!["feature:beta".to_owned()];
        if let Some(status) = ctx.status() {
            tags.push(format!("http:status:{}", status.as_u16()));
        }
        tags
    });
    let app = with_timing(
        Router::new().route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT })),
        rover,
    );
    let addr = serve(app).await;

    get_raw(addr, "/teapot").await;

    let samples = sink.take();
    let tags = &samples[0].tags;
    assert_eq!(tags.len(), 5);
    assert!(tags[0].starts_with("http:host:"));
    assert!(tags[1].starts_with("http:method:"));
    assert!(tags[2].starts_with("http:remote-addr:"));
    assert_eq!(&tags[3..], ["feature:beta", "http:status:418"]);
}

#[tokio::test]
async fn failing_sink_does_not_touch_the_response() {
    let sink = Arc::new(FailingSink {
        calls: AtomicUsize::new(0),
    });
    let hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = hits.clone();
    let app = with_timing(
        Router::new().route(
            "/users",
            get(move || {
                let hits = handler_hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    ([("x-handler", "users")], "all good")
                }
            }),
        ),
        Rover::new(sink.clone()),
    );
    let addr = serve(app).await;

    let (response, _) = get_raw(addr, "/users").await;

    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.to_ascii_lowercase().contains("x-handler: users"));
    assert_eq!(body(&response), "all good");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_errors_pass_through_and_are_still_timed() {
    let sink = Arc::new(CaptureSink::default());
    let app = with_timing(
        Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<&'static str, _>((StatusCode::SERVICE_UNAVAILABLE, "try later"))
            }),
        ),
        Rover::new(sink.clone()),
    );
    let addr = serve(app).await;

    let (response, _) = get_raw(addr, "/slow").await;
    assert!(response.starts_with("HTTP/1.1 503"), "{response}");
    assert_eq!(body(&response), "try later");

    let samples = sink.take();
    assert_eq!(samples.len(), 1);
    assert!(samples[0].duration >= Duration::from_millis(20));
}

#[tokio::test]
async fn unmatched_routes_are_timed_by_path() {
    let sink = Arc::new(CaptureSink::default());
    let app = with_timing(Router::new(), Rover::new(sink.clone()));
    let addr = serve(app).await;

    let (response, _) = get_raw(addr, "/nope").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    assert_eq!(sink.take()[0].identity, "/nope");
}
