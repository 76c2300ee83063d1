use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::lesson::LessonStatus;
use crate::models::schedule::{MeetingLink, WindowDelivery};

/// Counters accumulated over one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Confirmed lessons whose start fell inside the lookahead horizon.
    pub lessons_considered: usize,
    /// Windows fired (a lesson can contribute two on one pass).
    pub reminders_sent: usize,
    /// Individual recipient sends that the transport rejected.
    pub sends_failed: usize,
    /// Lessons dropped from this pass after a label or lookup failure.
    pub lessons_skipped: usize,
    /// Windows that were due but already recorded in the ledger.
    pub duplicates_suppressed: usize,
}

impl ScanReport {
    pub fn summary(&self) -> String {
        format!(
            "considered {} lessons, fired {} reminders ({} sends failed, {} lessons skipped, {} duplicates suppressed)",
            self.lessons_considered,
            self.reminders_sent,
            self.sends_failed,
            self.lessons_skipped,
            self.duplicates_suppressed
        )
    }
}

/// How close a lesson is to starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonPhase {
    /// More than an hour out.
    Upcoming,
    /// Inside the one-hour window.
    StartingSoon,
    /// Inside the final window.
    Imminent,
    /// Start instant already passed.
    Started,
}

/// Read-only view of one upcoming lesson, as served by the peek endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct LessonOutlook {
    pub lesson_id: String,
    pub subject: String,
    pub student_name: String,
    pub tutor_name: String,
    pub starts_at: DateTime<Utc>,
    pub starts_in: String,
    pub phase: LessonPhase,
    pub next_action: String,
    pub one_hour_sent: bool,
    pub final_sent: bool,
}

/// What happened when a final reminder was requested for one lesson.
#[derive(Debug)]
pub enum FinalReminderOutcome {
    Sent {
        link: MeetingLink,
        delivery: WindowDelivery,
    },
    AlreadySent,
    NotFound,
    NotConfirmed { status: LessonStatus },
    Unschedulable { reason: String },
}

/// Envelope for the scan trigger endpoint.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
    pub report: ScanReport,
    pub timestamp: DateTime<Utc>,
}

/// Envelope for the peek endpoint.
#[derive(Debug, Serialize)]
pub struct PeekResponse {
    pub success: bool,
    pub count: usize,
    pub upcoming: Vec<LessonOutlook>,
    pub timestamp: DateTime<Utc>,
}

/// Envelope for the manual final-reminder endpoint.
#[derive(Debug, Serialize)]
pub struct FinalReminderResponse {
    pub success: bool,
    pub message: String,
    pub lesson_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Which integrations the process actually has credentials for.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub lesson_store_configured: bool,
    pub mail_configured: bool,
    pub mail_sender: String,
    pub conference_configured: bool,
    pub ledger_path: String,
}

/// Envelope for the configuration check endpoint.
#[derive(Debug, Serialize)]
pub struct ConfigCheckResponse {
    pub success: bool,
    pub config: ConfigReport,
    pub message: String,
}

/// Envelope for the provisioning smoke-test endpoint.
#[derive(Debug, Serialize)]
pub struct ProvisionTestResponse {
    pub success: bool,
    pub link: String,
    pub degraded: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
