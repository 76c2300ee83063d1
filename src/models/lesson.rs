use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a lesson in the store.
///
/// Only confirmed lessons are scheduling candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

/// A lesson booking as returned by the lesson store.
///
/// `time` is the raw start-time label exactly as the store holds it
/// ("7:00 pm", "19:00"). It is parsed once at ingestion and never
/// interpreted anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub subject: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: u32,
    pub status: LessonStatus,
    pub student_id: String,
    pub tutor_id: String,
}

/// A user referenced by a lesson, student or tutor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A lesson joined with both parties and its resolved start instant.
///
/// This is the unit the scheduler works with once ingestion succeeded;
/// everything downstream (composition, provisioning, the ledger) reads
/// from it instead of going back to the store.
#[derive(Debug, Clone)]
pub struct LessonReminder {
    pub lesson_id: String,
    pub subject: String,
    pub date: NaiveDate,
    pub time_label: String,
    pub duration_minutes: u32,
    pub start_at: DateTime<Utc>,
    pub student: Party,
    pub tutor: Party,
}

impl LessonReminder {
    pub fn assemble(lesson: &Lesson, start_at: DateTime<Utc>, student: Party, tutor: Party) -> Self {
        Self {
            lesson_id: lesson.id.clone(),
            subject: lesson.subject.clone(),
            date: lesson.date,
            time_label: lesson.time.clone(),
            duration_minutes: lesson.duration_minutes,
            start_at,
            student,
            tutor,
        }
    }
}
