//! HTTP server exposing the exporter endpoints

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use spacelift_metrics::{exposition, SpaceliftCollector};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Time in-flight requests get to finish once a stop signal arrives
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

const HEALTH_MESSAGE: &str = "Countdown complete - ready to serve metrics!";

const INDEX_PAGE: &str = r#"<html>
    <head>
        <title>Spacelift Prometheus Exporter</title>
    </head>
    <body>
        Welcome to the Spacelift Prometheus exporter! Please find the available metrics at <a href="/metrics">/metrics</a>.
    </body>
</html>"#;

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<SpaceliftCollector>,
}

pub struct Server {
    bind_address: String,
    state: AppState,
}

impl Server {
    pub fn new(bind_address: String, state: AppState) -> Self {
        Self {
            bind_address,
            state,
        }
    }

    /// Serve until SIGINT or SIGTERM, then drain for at most
    /// [`SHUTDOWN_GRACE_PERIOD`].
    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.bind_address)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", self.bind_address))?;

        info!("Ready for launch! Listening on {}", self.bind_address);

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let router = build_router(self.state);
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::select! {
            joined = &mut server => {
                return joined
                    .context("HTTP server task failed")?
                    .context("HTTP server error");
            }
            _ = shutdown_signal() => {}
        }

        info!("Received stop signal - shutting down exporter");
        let _ = stop_tx.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(err))) => error!(error = %err, "Failed to gracefully shutdown exporter"),
            Ok(Err(err)) => error!(error = %err, "Failed to gracefully shutdown exporter"),
            Err(_) => {
                error!(
                    grace_period_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
                    "Failed to gracefully shutdown exporter"
                );
                server.abort();
            }
        }

        info!("Exporter has landed successfully!");
        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

// Route handlers

async fn root() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn health_check() -> &'static str {
    HEALTH_MESSAGE
}

async fn metrics(State(state): State<AppState>) -> Response {
    let scrape = state.collector.collect().await;

    match exposition::render(&scrape) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode Prometheus metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
