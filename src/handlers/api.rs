use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::mail::MailApi;
use crate::error::ScanError;
use crate::models::report::{
    ConfigCheckResponse, ConfigReport, FinalReminderOutcome, FinalReminderResponse, PeekResponse,
    RunResponse,
};
use crate::services::provisioner::LinkProvisioner;
use crate::services::scheduler::ReminderScheduler;
use crate::services::send_ledger::SendLedger;

// AppState struct containing shared resources
pub struct AppState {
    pub scheduler: ReminderScheduler,
    pub provisioner: LinkProvisioner,
    pub mail: Arc<dyn MailApi>,
    pub ledger: Arc<SendLedger>,
    pub scan_auth_token: Option<String>,
}

// With no token configured the trigger endpoint is open
fn scan_authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.scan_auth_token else {
        return true;
    };

    match headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => value == format!("Bearer {}", expected),
        None => false,
    }
}

fn scan_error_status(err: &ScanError) -> StatusCode {
    match err {
        ScanError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
        ScanError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Scan trigger endpoint, hit by the external cron
pub async fn run_reminder_scan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunResponse>, StatusCode> {
    if !scan_authorized(&state, &headers) {
        warn!("Rejected scan trigger with missing or bad bearer token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    info!("Received request to run a reminder scan");

    match state.scheduler.scan(Utc::now()).await {
        Ok(report) => Ok(Json(RunResponse {
            success: true,
            message: report.summary(),
            report,
            timestamp: Utc::now(),
        })),
        Err(err) => {
            error!("Reminder scan failed: {}", err);
            Err(scan_error_status(&err))
        }
    }
}

// Peek endpoint: upcoming lessons and what happens to them next
pub async fn upcoming_reminders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PeekResponse>, StatusCode> {
    info!("Received request to list upcoming reminders");

    match state.scheduler.peek(Utc::now()).await {
        Ok(upcoming) => {
            info!("Found {} lessons inside the lookahead horizon", upcoming.len());
            Ok(Json(PeekResponse {
                success: true,
                count: upcoming.len(),
                upcoming,
                timestamp: Utc::now(),
            }))
        }
        Err(err) => {
            error!("Failed to compute upcoming reminders: {}", err);
            Err(scan_error_status(&err))
        }
    }
}

// Manual final reminder endpoint
pub async fn send_final_reminder(
    State(state): State<Arc<AppState>>,
    Path(lesson_id): Path<String>,
) -> Result<Json<FinalReminderResponse>, StatusCode> {
    info!(
        "Received manual final reminder request for lesson {}",
        lesson_id
    );

    let outcome = state
        .scheduler
        .fire_final_reminder(&lesson_id, Utc::now())
        .await
        .map_err(|err| {
            error!("Manual final reminder failed: {}", err);
            scan_error_status(&err)
        })?;

    let response = match outcome {
        FinalReminderOutcome::Sent { link, delivery } => {
            let message = if delivery.all_ok() {
                format!("Final reminder sent with {} link", link.source())
            } else {
                format!(
                    "Final reminder sent with {} link, {} of 2 sends failed",
                    link.source(),
                    delivery.failed_count()
                )
            };
            FinalReminderResponse {
                success: delivery.all_ok(),
                message,
                lesson_id,
                timestamp: Utc::now(),
            }
        }
        FinalReminderOutcome::AlreadySent => FinalReminderResponse {
            success: false,
            message: "Final reminder was already sent for this lesson".to_string(),
            lesson_id,
            timestamp: Utc::now(),
        },
        FinalReminderOutcome::NotFound => {
            warn!("Lesson {} not found in store", lesson_id);
            return Err(StatusCode::NOT_FOUND);
        }
        FinalReminderOutcome::NotConfirmed { status } => FinalReminderResponse {
            success: false,
            message: format!("Lesson is not confirmed (status: {:?})", status),
            lesson_id,
            timestamp: Utc::now(),
        },
        FinalReminderOutcome::Unschedulable { reason } => {
            warn!("Lesson {} cannot be scheduled: {}", lesson_id, reason);
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    };

    Ok(Json(response))
}

// Configuration check endpoint
pub async fn check_config(State(state): State<Arc<AppState>>) -> Json<ConfigCheckResponse> {
    info!("Received configuration check request");

    let config = ConfigReport {
        lesson_store_configured: std::env::var("LESSON_STORE_ENDPOINT").is_ok(),
        mail_configured: state.mail.is_configured(),
        mail_sender: state.mail.sender_address().to_string(),
        conference_configured: state.provisioner.provider_configured(),
        ledger_path: state.ledger.path().to_string(),
    };

    let message = if config.mail_configured {
        "Mail transport configured".to_string()
    } else {
        "MAIL_API_KEY not set - reminders will be logged, not delivered".to_string()
    };

    Json(ConfigCheckResponse {
        success: true,
        config,
        message,
    })
}
