use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, http::StatusCode};
use tower::{BoxError, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lesson_reminder_service::{
    create_router, services::dispatch::NotificationDispatcher,
    services::provisioner::LinkProvisioner, services::scheduler::ReminderScheduler,
    services::send_ledger::create_send_ledger, AppState, ConferenceClient, LessonStoreClient,
    MailApi, MailClient,
};

// Error handler
async fn handle_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tokio::time::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", error),
        )
    }
}

#[tokio::main]
async fn main() {
    // The guard must outlive main for events to flush
    #[cfg(feature = "sentry-monitoring")]
    let _sentry_guard = env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize the outbound API clients
    let lesson_store = Arc::new(LessonStoreClient::from_env());
    let mail: Arc<dyn MailApi> = Arc::new(MailClient::from_env());
    let conference = Arc::new(ConferenceClient::from_env());

    if !mail.is_configured() {
        info!("MAIL_API_KEY not set - reminders will be logged instead of delivered");
    }

    // Initialize the send ledger
    let ledger = create_send_ledger();
    info!("Send ledger initialized at {}", ledger.path());

    // Domain used for synthetic links when the provider is unavailable
    let fallback_domain =
        env::var("FALLBACK_LINK_DOMAIN").unwrap_or_else(|_| "meet.jit.si".to_string());

    let provisioner = LinkProvisioner::new(conference, fallback_domain);
    if !provisioner.provider_configured() {
        info!("Conference provider not configured - final reminders will carry synthetic links");
    }

    let dispatcher = NotificationDispatcher::new(Arc::clone(&mail));
    let scheduler = ReminderScheduler::new(
        lesson_store,
        dispatcher,
        provisioner.clone(),
        Arc::clone(&ledger),
    );

    // Load scan auth token from environment if provided
    let scan_auth_token = env::var("SCAN_AUTH_TOKEN").ok();

    if scan_auth_token.is_some() {
        info!("Scan trigger authentication enabled with provided token");
    } else {
        info!("No scan auth token provided - trigger endpoint is open");
    }

    // Check if running in production mode
    let is_production = env::var("ENVIRONMENT")
        .map(|val| val.to_lowercase() == "production")
        .unwrap_or(false);

    if is_production {
        info!("Running in PRODUCTION mode - restricting available endpoints");
    } else {
        info!("Running in DEVELOPMENT mode - all endpoints will be available");
    }

    // Create shared application state
    let app_state = Arc::new(AppState {
        scheduler,
        provisioner,
        mail,
        ledger,
        scan_auth_token,
    });

    // Create router with appropriate routes based on environment
    let app = create_router(app_state, is_production).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .load_shed()
            .concurrency_limit(64)
            .timeout(Duration::from_secs(10))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any)),
    );

    // Bind to port 3000
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    // Set up signal handler for graceful shutdown
    let shutdown = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received interrupt signal, starting graceful shutdown");
            },
            _ = terminate => {
                info!("Received terminate signal, starting graceful shutdown");
            },
        }
    };

    // Start server with graceful shutdown
    info!("Server is ready to accept connections");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .expect("Failed to start server");

    info!("Server has been gracefully shut down");
}
