//! Journal Portal API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication (identity gate) and role checks via the workflow services
//! - Rate limiting, body limits, timeouts
//! - Request routing
//! - Observability (logging, metrics, tracing)
//! - The notification worker's lifetime

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{StatusCode, Uri},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use journal_common::{
    auth::{create_identity_provider, IdentityProvider},
    config::{AppConfig, ObservabilityConfig},
    db::{schema::create_schema, DbPool},
    errors::AppError,
    mail::create_mailer,
    metrics::{self as portal_metrics, LATENCY_BUCKETS},
    notify::{NotificationWorker, Notifier},
    storage::{create_storage, ObjectStorage},
    IdentityGate, Repository, Services,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use middleware::rate_limit::{rate_limit_middleware, RateLimitState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub gate: IdentityGate,
    pub services: Services,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        db: DbPool,
        identity: Arc<dyn IdentityProvider>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Notifier,
    ) -> Self {
        let repo = Repository::new(db.clone());
        let services = Services::new(repo, storage, notifier, &config);
        let gate = IdentityGate::new(identity, services.profiles.clone());
        Self {
            config,
            db,
            gate,
            services,
        }
    }
}

impl FromRef<AppState> for IdentityGate {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load().context("failed to load configuration")?);

    init_tracing(&config.observability);
    info!(
        "Starting Journal Portal API Gateway v{}",
        journal_common::VERSION
    );

    install_metrics_exporter(config.observability.metrics_port)?;

    // Database
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        info!("Creating missing tables");
        create_schema(db.connection()).await?;
    }

    // Providers
    let identity = create_identity_provider(&config.identity)?;
    let storage = create_storage(&config.storage)?;
    let mailer = create_mailer(&config.email)?;
    info!(
        identity = identity.name(),
        storage = storage.name(),
        mailer = mailer.name(),
        "Providers configured"
    );

    // Notification fan-out runs beside the request path
    let (notifier, events) = Notifier::channel(config.notifications.queue_capacity);
    let worker = NotificationWorker::new(
        Repository::new(db.clone()),
        mailer,
        config.notifications.portal_url.clone(),
    );
    let worker_handle = tokio::spawn(worker.run(events));

    let state = AppState::new(config.clone(), db, identity, storage, notifier);

    if let Some(profile) = state.services.profiles.bootstrap_seed_admin().await? {
        info!(profile_id = %profile.id, "Seed admin bootstrapped");
    }

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last senders; let the worker drain what is queued
    match tokio::time::timeout(config.shutdown_timeout(), worker_handle).await {
        Ok(Ok(())) => info!("Notification worker drained"),
        Ok(Err(e)) => error!(error = %e, "Notification worker panicked"),
        Err(_) => warn!("Notification worker did not drain before shutdown timeout"),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Port 0 disables the exporter
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        info!("Metrics exporter disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()
        .context("failed to install Prometheus exporter")?;

    portal_metrics::register_metrics();
    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Room for a PDF plus a Word file, or one base64-encoded revision
    let body_limit = config.storage.max_upload_bytes.saturating_mul(2);

    let routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Caller
        .route("/me", get(handlers::profiles::me))
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route("/notifications/{id}/read", post(handlers::notifications::mark_read))

        // Submissions
        .route("/submissions/create", post(handlers::submissions::create_submission))
        .route("/submissions/mine", get(handlers::submissions::my_submissions))
        .route("/submissions/{id}/upload-revision", post(handlers::submissions::upload_revision))
        .route("/submissions/{id}/signed-url", get(handlers::submissions::signed_url))

        // Editorial desk
        .route("/admin/list-manuscripts", get(handlers::admin::list_manuscripts))
        .route("/admin/queue", get(handlers::admin::queue))
        .route("/admin/submissions/{id}", get(handlers::admin::submission_detail))
        .route("/admin/update-manuscript-status", post(handlers::admin::update_status))
        .route("/admin/review/assign", post(handlers::reviews::assign_reviewer))
        .route("/admin/review/decision", post(handlers::reviews::submit_decision))
        .route("/admin/publish-issue", post(handlers::issues::publish_issue))
        .route("/admin/issues/{id}/cover", patch(handlers::issues::update_cover))
        .route("/admin/profiles", get(handlers::profiles::list_profiles))
        .route("/admin/profiles/{id}/access", post(handlers::profiles::update_access))

        // Public reads
        .route("/issues", get(handlers::issues::list_issues))
        .route("/issues/latest", get(handlers::issues::latest_issue))
        .route("/issues/{id}", get(handlers::issues::get_issue))
        .route("/articles/{id}", get(handlers::issues::get_article))
        .route("/articles/{id}/pdf", get(handlers::issues::article_pdf))
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .fallback(not_found);

    let mut app = routes
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(request_timeout_layer(config.request_timeout()))
        .layer(GlobalConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests,
        ));

    if config.rate_limit.enabled {
        app = app.layer(from_fn_with_state(
            RateLimitState::new(&config.rate_limit),
            rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Slow requests end with 408 rather than an empty 500
fn request_timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::not_found("route", uri.path())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
