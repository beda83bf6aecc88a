use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::ConnectInfo,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, Overrides, load_pref_or_default};
use crate::network::Categorizer;
use crate::render::Template;

mod assets;
mod block;
mod probe;

use assets::Logo;

#[derive(Parser)]
#[command(name = "block-handler")]
#[command(author = "")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Block page responder for sinkholed domains", long_about = None)]
struct Cli {
    /// Path to pref.toml (default: conf/pref.toml if present)
    #[arg(long, global = true)]
    pref: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve block pages (default)
    Serve,
    /// Send one lookup to the categorization API and print the raw exchange
    Probe {
        /// URL to categorize
        #[arg(default_value = "https://example.com")]
        url: String,
    },
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let base_dir = PathBuf::from(".");

    let pref = load_pref_or_default(args.pref.as_deref(), &base_dir)?;
    let config = Config::resolve(pref, args.overrides, &base_dir)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Probe { url } => probe::run(&config, &url).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let state = AppState::new(&config)?;

    let app = router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    version = ?req.version(),
                    remote = %req
                        .headers()
                        .get("X-Forwarded-For")
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string())
                        .or_else(|| req
                            .extensions()
                            .get::<ConnectInfo<SocketAddr>>()
                            .map(|ConnectInfo(addr)| addr.ip().to_string()))
                        .unwrap_or_else(|| "-".to_string())
                )
            })
            .on_request(|req: &axum::http::Request<_>, _span: &tracing::Span| {
                info!(uri = %req.uri(), "incoming request");
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    let status = res.status();
                    if status.is_client_error() || status.is_server_error() {
                        warn!(status = %status, latency_ms = latency.as_millis(), "http response");
                    } else {
                        info!(status = %status, latency_ms = latency.as_millis(), "http response");
                    }
                },
            )
            .on_failure(
                |failure_class: ServerErrorsFailureClass,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    match failure_class {
                        ServerErrorsFailureClass::StatusCode(status) => {
                            warn!(status = %status, latency_ms = latency.as_millis(), "http failure");
                        }
                        ServerErrorsFailureClass::Error(error) => {
                            warn!(error = %error, latency_ms = latency.as_millis(), "http failure");
                        }
                    }
                },
            ),
    );

    let listen_addr = config.listen_addr();
    info!("binding block handler to {listen_addr}");
    let listener = TcpListener::bind(&listen_addr)
        .await
        .context(format!("failed to bind {listen_addr}"))?;
    info!(
        api_url = %config.api.url,
        timeout_secs = config.api.timeout.as_secs(),
        "block handler listening on {listen_addr}"
    );
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("block handler stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
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
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub categorizer: Arc<Categorizer>,
    pub template: Arc<Template>,
    pub logo: Arc<Logo>,
}

impl AppState {
    /// Load the template and build the API client. A missing template is
    /// fatal; a missing logo is only logged.
    pub fn new(config: &Config) -> Result<Self> {
        let template = Template::load(&config.template_path)?;
        let categorizer = Categorizer::new(&config.api)?;
        let logo = Logo::new(&config.logo_path)?;
        if !config.logo_path.exists() {
            warn!(path = %config.logo_path.display(), "logo file not found; requests for it fall through to the block page");
        }

        Ok(Self {
            categorizer: Arc::new(categorizer),
            template: Arc::new(template),
            logo: Arc::new(logo),
        })
    }
}

pub fn router(state: AppState) -> Router {
    let logo_route = state.logo.route().to_string();
    Router::new()
        .route(
            "/health",
            get(handle_health).fallback(block::handle_block),
        )
        .route(
            &logo_route,
            get(assets::handle_logo).fallback(block::handle_block),
        )
        .fallback(block::handle_block)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "block-handler",
    })
}

/// Client-facing rejection, rendered as plain text.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}
