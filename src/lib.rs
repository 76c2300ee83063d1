//! Lesson Reminder Service
//!
//! This library implements a scan-driven reminder pipeline for tutoring
//! lessons. An external trigger (typically a cron hitting the HTTP
//! endpoint) runs a pass over every confirmed lesson inside a two-hour
//! lookahead horizon and fires time-windowed reminders: a heads-up one
//! hour before the lesson and a final reminder, carrying the meeting
//! link, one minute before the start.
//!
//! # Modules
//!
//! - `clients`: lesson store, mail transport, and conference provider APIs
//! - `services`: scheduling pipeline, send ledger, and link provisioning
//! - `handlers`/`routes`: the HTTP surface the trigger and operators hit
//! - `auth`: request signing for the conference provider API
//!
//! # Delivery guarantees
//!
//! Every send is recorded in a CSV ledger keyed by (lesson, window), and
//! a window found in the ledger is never fired again. The process itself
//! keeps no state; restarting it mid-schedule loses nothing.

pub mod auth;
pub mod clients;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
pub mod client_mock;


// Re-export the main types for ease of use
pub use auth::ConferenceAuth;
pub use clients::conference::{ConferenceApi, ConferenceClient};
pub use clients::lessons::{LessonDirectory, LessonStoreClient};
pub use clients::mail::{MailApi, MailClient};
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::scheduler::ReminderScheduler;
pub use services::send_ledger::{create_send_ledger, SendLedger};
