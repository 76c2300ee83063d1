use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    check_config, run_reminder_scan, send_final_reminder, upcoming_reminders, AppState,
};
use crate::handlers::test::{health_check, test_provision};

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    // Scan trigger and peek are the operational surface, always available
    let reminder_routes = Router::new()
        .route("/reminders/run", post(run_reminder_scan))
        .route("/reminders/upcoming", get(upcoming_reminders));
    router = router.merge(reminder_routes);

    // Only add management routes if not in production mode
    if !is_production {
        let management_routes = Router::new()
            .route("/lessons/:lesson_id/final-reminder", post(send_final_reminder))
            .route("/config/check", get(check_config))
            .route("/provision/test", get(test_provision));

        router = router.merge(management_routes);

        info!("Management routes enabled - server running in development mode");
    } else {
        info!("Running in production mode - only reminder and health endpoints exposed");
    }

    router.with_state(app_state)
}
