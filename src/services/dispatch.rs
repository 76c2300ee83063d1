use futures::future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::mail::MailApi;
use crate::models::lesson::{LessonReminder, Party};
use crate::models::schedule::{DeliveryOutcome, MeetingLink, ReminderWindow, WindowDelivery};

/// Composes the message for a window and hands it to the mail transport,
/// once per recipient.
///
/// Both sends run concurrently and each failure is contained: a rejected
/// student send never blocks the tutor send or the rest of the pass.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mail: Arc<dyn MailApi>,
}

impl NotificationDispatcher {
    pub fn new(mail: Arc<dyn MailApi>) -> Self {
        Self { mail }
    }

    /// Fire one window for one lesson. Never fails; per-recipient results
    /// land in the returned delivery.
    pub async fn dispatch(
        &self,
        reminder: &LessonReminder,
        window: ReminderWindow,
        link: Option<&MeetingLink>,
    ) -> WindowDelivery {
        let (subject, body) = compose_message(reminder, window, link);

        let (student, tutor) = future::join(
            self.deliver(&reminder.student, &subject, &body),
            self.deliver(&reminder.tutor, &subject, &body),
        )
        .await;

        let delivery = WindowDelivery {
            window,
            student,
            tutor,
        };

        if delivery.all_ok() {
            info!(
                "Delivered {} reminder to both parties for lesson {}",
                window, reminder.lesson_id
            );
        } else {
            warn!(
                "{} reminder partially failed for lesson {}: student ok={}, tutor ok={}",
                window, reminder.lesson_id, delivery.student.accepted, delivery.tutor.accepted
            );
        }

        delivery
    }

    async fn deliver(&self, party: &Party, subject: &str, body: &str) -> DeliveryOutcome {
        match self.mail.send_message(&party.email, subject, body).await {
            Ok(receipt) => DeliveryOutcome {
                email: party.email.clone(),
                accepted: true,
                receipt_id: receipt.id,
                error: None,
            },
            Err(e) => {
                error!("Failed to send reminder to {}: {}", party.email, e);
                DeliveryOutcome {
                    email: party.email.clone(),
                    accepted: false,
                    receipt_id: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// One subject and body per window; both recipients get the same text.
pub fn compose_message(
    reminder: &LessonReminder,
    window: ReminderWindow,
    link: Option<&MeetingLink>,
) -> (String, String) {
    let details = format!(
        "Lesson details:\n\
         - Subject: {}\n\
         - Date: {}\n\
         - Time: {}\n\
         - Duration: {} minutes\n\
         - Student: {}\n\
         - Tutor: {}",
        reminder.subject,
        reminder.date,
        reminder.time_label,
        reminder.duration_minutes,
        reminder.student.name,
        reminder.tutor.name
    );

    match window {
        ReminderWindow::OneHour => {
            let subject = format!(
                "Reminder: your {} lesson with {} starts in 1 hour",
                reminder.subject, reminder.tutor.name
            );
            let body = format!(
                "Your {} lesson with {} starts in 1 hour.\n\n\
                 {}\n\n\
                 The meeting link will be sent one minute before the lesson starts.\n\n\
                 Best regards,\n\
                 The Lessons Team\n",
                reminder.subject, reminder.tutor.name, details
            );
            (subject, body)
        }
        ReminderWindow::OneMinute => {
            let join_url = link.map(MeetingLink::url).unwrap_or("(link unavailable)");
            let subject = format!("Your {} lesson starts now", reminder.subject);
            let body = format!(
                "Your {} lesson with {} starts now!\n\n\
                 Join here: {}\n\n\
                 {}\n\n\
                 Click the link above to join your session.\n\n\
                 Best regards,\n\
                 The Lessons Team\n",
                reminder.subject, reminder.tutor.name, join_url, details
            );
            (subject, body)
        }
    }
}
