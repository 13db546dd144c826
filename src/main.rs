//! Microlend Backend Server
//!
//! Administrative backend for a microloan lending operation: loan lifecycle,
//! transaction reconciliation, credit scoring, support tickets, and loan
//! analytics for the admin console.

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use microlend_server::config::Config;
use microlend_server::db;
use microlend_server::loan::{overdue_detector, LoanDefaults, LoanService};
use microlend_server::middleware::auth::AdminToken;
use microlend_server::middleware::{self, RateLimiter};
use microlend_server::notify::Notifier;
use microlend_server::reconciliation::ReconciliationService;
use microlend_server::routes;
use microlend_server::scoring::ScoringService;
use microlend_server::services::AnalyticsService;
use microlend_server::state::AppState;
use microlend_server::tickets::TicketService;
use microlend_server::transactions::TransactionService;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = %config.environment.as_str(), "Starting microlend backend");

    // Initialize database connection pool and schema
    let db_pool = match db::create_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::run_migrations(&db_pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // Wire up services
    let notifier = Arc::new(Notifier::new(config.notification_url.clone()));
    let scoring_service = ScoringService::new(db_pool.clone());

    let loan_service = Arc::new(LoanService::new(
        db_pool.clone(),
        scoring_service.clone(),
        notifier.clone(),
        LoanDefaults {
            interest_rate_bps: config.default_interest_rate_bps,
            repayment_period_days: config.default_repayment_period_days,
            default_after_days: config.default_after_days,
            default_penalty_points: config.default_penalty_points,
        },
    ));

    let transaction_service = Arc::new(TransactionService::new(db_pool.clone()));

    let reconciliation_service = Arc::new(ReconciliationService::new(
        db_pool.clone(),
        scoring_service.clone(),
        notifier.clone(),
        config.reconcile_statement_timeout_ms,
        config.reconcile_max_retries,
    ));

    let ticket_service = Arc::new(TicketService::new(db_pool.clone()));
    let analytics_service = Arc::new(AnalyticsService::new(db_pool.clone()));

    let app_state = AppState {
        loan_service: loan_service.clone(),
        transaction_service,
        reconciliation_service,
        scoring_service: Arc::new(scoring_service),
        ticket_service,
        analytics_service,
        admin_token: AdminToken(config.admin_api_token.clone()),
        payment_webhook_secret: config.payment_webhook_secret.clone(),
    };

    // Start overdue detector in background
    let sweep_service = loan_service.clone();
    let sweep_interval = config.overdue_sweep_interval_secs;
    tokio::spawn(async move {
        overdue_detector(sweep_service, sweep_interval).await;
        tracing::error!("Overdue detector task exited unexpectedly");
    });

    // Initialize rate limiter and its bucket cleanup task
    let rate_limiter = RateLimiter::new(config.rate_limit_rps);
    tokio::spawn(middleware::rate_limiter_cleanup(rate_limiter.clone()));

    // Clone db_pool for health check
    let health_db_pool = db_pool.clone();

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(move || health_check(health_db_pool.clone())))
        .merge(routes::loan_routes())
        .merge(routes::transaction_routes())
        .merge(routes::credit_routes())
        .merge(routes::ticket_routes())
        .merge(routes::analytics_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(axum::middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_layer(limiter)(req, next)
        }))
        .layer(configure_cors(&config));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "Microlend API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    version: String,
}

/// Health check endpoint
async fn health_check(pool: sqlx::PgPool) -> axum::Json<HealthResponse> {
    let db_status = match db::check_health(&pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    let status = if db_status == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    axum::Json(HealthResponse {
        status: status.to_string(),
        database: db_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins_str = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
