use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::clients::lessons::LessonDirectory;
use crate::error::{ScanError, StoreError};
use crate::models::lesson::{Lesson, LessonReminder, LessonStatus};
use crate::models::report::{FinalReminderOutcome, LessonOutlook, LessonPhase, ScanReport};
use crate::models::schedule::{MeetingLink, ReminderWindow, WindowDelivery};
use crate::services::dispatch::NotificationDispatcher;
use crate::services::lesson_time::{describe_time_until, resolve_lesson_start};
use crate::services::provisioner::LinkProvisioner;
use crate::services::send_ledger::{SendLedger, SendRow};

/// How far ahead a pass looks for candidates, in minutes.
pub const LOOKAHEAD_MINUTES: i64 = 120;

/// Stateless-by-design reminder pipeline, driven by an external trigger.
///
/// Each `scan` walks every confirmed lesson inside the lookahead horizon,
/// fires whichever reminder windows cover the remaining time, and spends
/// each (lesson, window) pair in the ledger so later passes leave it
/// alone. All timing flows from the `now` the caller passes in; the
/// scheduler itself never reads the clock.
pub struct ReminderScheduler {
    lessons: Arc<dyn LessonDirectory>,
    dispatcher: NotificationDispatcher,
    provisioner: LinkProvisioner,
    ledger: Arc<SendLedger>,
    scan_lock: Mutex<()>,
}

impl ReminderScheduler {
    pub fn new(
        lessons: Arc<dyn LessonDirectory>,
        dispatcher: NotificationDispatcher,
        provisioner: LinkProvisioner,
        ledger: Arc<SendLedger>,
    ) -> Self {
        Self {
            lessons,
            dispatcher,
            provisioner,
            ledger,
            scan_lock: Mutex::new(()),
        }
    }

    /// Run one reminder pass as of `now`.
    ///
    /// Passes are serialized on an internal lock; an overlapping trigger
    /// queues behind the running pass instead of racing it. Per-lesson
    /// problems are logged and counted, never fatal; only a dead lesson
    /// store or an unreadable ledger aborts the pass.
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<ScanReport, ScanError> {
        let _guard = self.scan_lock.lock().await;
        info!("Starting reminder scan at {}", now);

        let lessons = self.lessons.list_confirmed_lessons().await?;
        let mut report = ScanReport::default();

        for lesson in &lessons {
            // Candidates are confirmed lessons only, whatever the store sent
            if lesson.status != LessonStatus::Confirmed {
                continue;
            }

            let start_at = match resolve_lesson_start(lesson.date, &lesson.time) {
                Ok(start) => start,
                Err(e) => {
                    warn!("Skipping lesson {}: {}", lesson.id, e);
                    report.lessons_skipped += 1;
                    continue;
                }
            };

            if start_at <= now {
                debug!("Lesson {} already started, nothing to do", lesson.id);
                continue;
            }
            if start_at > now + Duration::minutes(LOOKAHEAD_MINUTES) {
                continue;
            }

            report.lessons_considered += 1;
            let remaining = start_at - now;

            // Which covering windows are still unspent?
            let mut to_fire = Vec::new();
            for window in ReminderWindow::ALL {
                if !window.contains(remaining) {
                    continue;
                }
                if self.ledger.was_sent(&lesson.id, window)? {
                    debug!("{} window already spent for lesson {}", window, lesson.id);
                    report.duplicates_suppressed += 1;
                } else {
                    to_fire.push(window);
                }
            }
            if to_fire.is_empty() {
                continue;
            }

            let reminder = match self.hydrate(lesson, start_at).await {
                Ok(reminder) => reminder,
                Err(e) => {
                    warn!("Skipping lesson {}: {}", lesson.id, e);
                    report.lessons_skipped += 1;
                    continue;
                }
            };

            for window in to_fire {
                let link = match window {
                    ReminderWindow::OneMinute => {
                        Some(self.provisioner.provision(&reminder).await)
                    }
                    ReminderWindow::OneHour => None,
                };

                let delivery = self.dispatcher.dispatch(&reminder, window, link.as_ref()).await;
                report.reminders_sent += 1;
                report.sends_failed += delivery.failed_count();

                self.record_send(&reminder, window, &delivery, link.as_ref(), now);
            }
        }

        info!("Reminder scan complete: {}", report.summary());
        Ok(report)
    }

    /// What the next passes would act on, without sending anything.
    pub async fn peek(&self, now: DateTime<Utc>) -> Result<Vec<LessonOutlook>, ScanError> {
        let lessons = self.lessons.list_confirmed_lessons().await?;
        let mut outlooks = Vec::new();

        for lesson in &lessons {
            if lesson.status != LessonStatus::Confirmed {
                continue;
            }

            let start_at = match resolve_lesson_start(lesson.date, &lesson.time) {
                Ok(start) => start,
                Err(e) => {
                    warn!("Skipping lesson {}: {}", lesson.id, e);
                    continue;
                }
            };
            if start_at <= now || start_at > now + Duration::minutes(LOOKAHEAD_MINUTES) {
                continue;
            }

            let reminder = match self.hydrate(lesson, start_at).await {
                Ok(reminder) => reminder,
                Err(e) => {
                    warn!("Skipping lesson {}: {}", lesson.id, e);
                    continue;
                }
            };

            let one_hour_sent = self.ledger.was_sent(&lesson.id, ReminderWindow::OneHour)?;
            let final_sent = self.ledger.was_sent(&lesson.id, ReminderWindow::OneMinute)?;
            let remaining = start_at - now;
            let phase = classify_phase(remaining);

            outlooks.push(LessonOutlook {
                lesson_id: lesson.id.clone(),
                subject: lesson.subject.clone(),
                student_name: reminder.student.name.clone(),
                tutor_name: reminder.tutor.name.clone(),
                starts_at: start_at,
                starts_in: describe_time_until(start_at, now),
                phase,
                next_action: next_action(phase, start_at, now, one_hour_sent, final_sent),
                one_hour_sent,
                final_sent,
            });
        }

        Ok(outlooks)
    }

    /// Operator-triggered final reminder for one lesson.
    ///
    /// The timing windows do not apply here, but the ledger still does: a
    /// final reminder the scan already fired is not fired again.
    pub async fn fire_final_reminder(
        &self,
        lesson_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FinalReminderOutcome, ScanError> {
        let _guard = self.scan_lock.lock().await;

        let Some(lesson) = self.lessons.get_lesson(lesson_id).await? else {
            return Ok(FinalReminderOutcome::NotFound);
        };
        if lesson.status != LessonStatus::Confirmed {
            return Ok(FinalReminderOutcome::NotConfirmed {
                status: lesson.status,
            });
        }

        let start_at = match resolve_lesson_start(lesson.date, &lesson.time) {
            Ok(start) => start,
            Err(e) => {
                return Ok(FinalReminderOutcome::Unschedulable {
                    reason: e.to_string(),
                })
            }
        };

        if self.ledger.was_sent(&lesson.id, ReminderWindow::OneMinute)? {
            return Ok(FinalReminderOutcome::AlreadySent);
        }

        let reminder = match self.hydrate(&lesson, start_at).await {
            Ok(reminder) => reminder,
            Err(e) => {
                return Ok(FinalReminderOutcome::Unschedulable {
                    reason: e.to_string(),
                })
            }
        };

        let link = self.provisioner.provision(&reminder).await;
        let delivery = self
            .dispatcher
            .dispatch(&reminder, ReminderWindow::OneMinute, Some(&link))
            .await;
        self.record_send(&reminder, ReminderWindow::OneMinute, &delivery, Some(&link), now);

        info!("Manual final reminder fired for lesson {}", lesson.id);
        Ok(FinalReminderOutcome::Sent { link, delivery })
    }

    // Both user lookups run concurrently; either failing skips the lesson.
    async fn hydrate(
        &self,
        lesson: &Lesson,
        start_at: DateTime<Utc>,
    ) -> Result<LessonReminder, StoreError> {
        let (student, tutor) = tokio::join!(
            self.lessons.get_user(&lesson.student_id),
            self.lessons.get_user(&lesson.tutor_id)
        );
        Ok(LessonReminder::assemble(lesson, start_at, student?, tutor?))
    }

    fn record_send(
        &self,
        reminder: &LessonReminder,
        window: ReminderWindow,
        delivery: &WindowDelivery,
        link: Option<&MeetingLink>,
        now: DateTime<Utc>,
    ) {
        let row = SendRow {
            lesson_id: reminder.lesson_id.clone(),
            window: window.as_str().to_string(),
            lesson_start: reminder.start_at.to_rfc3339(),
            subject: reminder.subject.clone(),
            student_email: reminder.student.email.clone(),
            tutor_email: reminder.tutor.email.clone(),
            student_accepted: delivery.student.accepted,
            tutor_accepted: delivery.tutor.accepted,
            join_url: link.map(|l| l.url().to_string()).unwrap_or_default(),
            link_source: link.map(|l| l.source().to_string()).unwrap_or_default(),
            sent_at: now.to_rfc3339(),
        };

        // Continue the pass even if ledger storage fails
        if let Err(e) = self.ledger.record(row) {
            error!(
                "Failed to record {} send for lesson {}: {}",
                window, reminder.lesson_id, e
            );
        }
    }
}

/// Phase of a lesson given its remaining time.
pub fn classify_phase(remaining: Duration) -> LessonPhase {
    if remaining <= Duration::zero() {
        LessonPhase::Started
    } else if remaining <= ReminderWindow::OneMinute.upper_bound() {
        LessonPhase::Imminent
    } else if remaining <= ReminderWindow::OneHour.upper_bound() {
        LessonPhase::StartingSoon
    } else {
        LessonPhase::Upcoming
    }
}

fn next_action(
    phase: LessonPhase,
    start_at: DateTime<Utc>,
    now: DateTime<Utc>,
    one_hour_sent: bool,
    final_sent: bool,
) -> String {
    match phase {
        LessonPhase::Started => "lesson has started".to_string(),
        LessonPhase::Imminent if final_sent => "final reminder sent".to_string(),
        LessonPhase::Imminent => "final reminder due".to_string(),
        LessonPhase::StartingSoon if one_hour_sent => {
            "final reminder at one minute to start".to_string()
        }
        LessonPhase::StartingSoon => "one-hour reminder due".to_string(),
        LessonPhase::Upcoming => {
            let window_opens = start_at - ReminderWindow::OneHour.upper_bound();
            format!("one-hour reminder in {}", describe_time_until(window_opens, now))
        }
    }
}
