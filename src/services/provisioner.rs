use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::conference::{ConferenceApi, CreateMeetingRequest};
use crate::models::lesson::LessonReminder;
use crate::models::schedule::MeetingLink;

/// Turns a lesson into a join URL, one way or another.
///
/// The conference provider is tried first; any failure there downgrades
/// to a synthesized link on the fallback domain instead of surfacing an
/// error, so a final reminder always carries something clickable.
#[derive(Clone)]
pub struct LinkProvisioner {
    api: Arc<dyn ConferenceApi>,
    fallback_domain: String,
}

impl LinkProvisioner {
    pub fn new(api: Arc<dyn ConferenceApi>, fallback_domain: impl Into<String>) -> Self {
        Self {
            api,
            fallback_domain: fallback_domain.into(),
        }
    }

    pub fn provider_configured(&self) -> bool {
        self.api.is_configured()
    }

    /// Provision a meeting for this lesson. Infallible by construction.
    pub async fn provision(&self, reminder: &LessonReminder) -> MeetingLink {
        if !self.api.is_configured() {
            debug!(
                "Conference provider not configured, issuing generated link for lesson {}",
                reminder.lesson_id
            );
            return MeetingLink::Degraded(self.synthesize_join_url(reminder));
        }

        let end_at = reminder.start_at + Duration::minutes(i64::from(reminder.duration_minutes));
        let request = CreateMeetingRequest {
            subject: format!(
                "{} - {} & {}",
                reminder.subject, reminder.student.name, reminder.tutor.name
            ),
            start_time: reminder.start_at.to_rfc3339(),
            end_time: end_at.to_rfc3339(),
            attendees: vec![reminder.student.email.clone(), reminder.tutor.email.clone()],
        };

        match self.api.create_meeting(&request).await {
            Ok(created) => {
                info!(
                    "Provisioned meeting {} for lesson {}",
                    created.meeting_id, reminder.lesson_id
                );
                MeetingLink::Live(created.join_url)
            }
            Err(e) => {
                warn!(
                    "Conference provisioning failed for lesson {}: {}. Falling back to generated link",
                    reminder.lesson_id, e
                );
                MeetingLink::Degraded(self.synthesize_join_url(reminder))
            }
        }
    }

    // Deterministic shape, random tail: lesson-{subject}-{yyyymmdd}-{token}
    fn synthesize_join_url(&self, reminder: &LessonReminder) -> String {
        let subject_slug: String = reminder
            .subject
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let date = reminder.date.format("%Y%m%d");
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();

        format!(
            "https://{}/lesson-{}-{}-{}",
            self.fallback_domain, subject_slug, date, token
        )
    }
}
