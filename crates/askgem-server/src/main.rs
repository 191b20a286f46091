use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use askgem_config::Settings;
use askgem_server::{router, AppState};
use axum::body::Body;
use axum::http::{Request, Response};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Reads .env first so RUST_LOG from it reaches the subscriber.
    let settings = Settings::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    settings.log_summary();
    let addr = settings.bind_addr.clone();
    let state = Arc::new(AppState::from_settings(settings)?);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let app = router(state).layer(trace_layer);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
