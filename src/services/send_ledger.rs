use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::error::LedgerError;
use crate::models::schedule::ReminderWindow;

// One fired window, as persisted in the CSV ledger
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SendRow {
    pub lesson_id: String,
    pub window: String,
    pub lesson_start: String, // ISO format
    pub subject: String,
    pub student_email: String,
    pub tutor_email: String,
    pub student_accepted: bool,
    pub tutor_accepted: bool,
    pub join_url: String,    // empty for hour reminders
    pub link_source: String, // "live", "degraded", or empty
    pub sent_at: String,     // ISO format
}

const COLUMNS: [&str; 11] = [
    "lesson_id",
    "window",
    "lesson_start",
    "subject",
    "student_email",
    "tutor_email",
    "student_accepted",
    "tutor_accepted",
    "join_url",
    "link_source",
    "sent_at",
];

/// Durable record of every window already fired.
///
/// One row per (lesson, window); the pair is the key. The mutex guards
/// check-and-append as a unit, so a window can only be spent once no
/// matter how record() calls interleave.
pub struct SendLedger {
    csv_path: String,
    file_mutex: Mutex<()>,
}

impl SendLedger {
    pub fn new(csv_path: &str) -> Self {
        // Create the CSV file if it doesn't exist with proper headers
        if !Path::new(csv_path).exists() {
            info!("Creating new send ledger at {}", csv_path);

            let file = File::create(csv_path).unwrap_or_else(|e| {
                error!("Failed to create send ledger: {}", e);
                panic!("Failed to create send ledger: {}", e)
            });

            let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

            if let Err(e) = writer.write_record(COLUMNS) {
                error!("Failed to write ledger headers: {}", e);
                panic!("Failed to write ledger headers: {}", e);
            }

            if let Err(e) = writer.flush() {
                error!("Failed to flush ledger headers: {}", e);
                panic!("Failed to flush ledger headers: {}", e);
            }
        }

        Self {
            csv_path: csv_path.to_string(),
            file_mutex: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.csv_path
    }

    /// Has this (lesson, window) pair already been fired?
    pub fn was_sent(&self, lesson_id: &str, window: ReminderWindow) -> Result<bool, LedgerError> {
        let _lock = self.file_mutex.lock().map_err(|_| LedgerError::LockPoisoned)?;
        self.contains_row(lesson_id, window.as_str())
    }

    /// Append a row unless its (lesson, window) pair is already present.
    ///
    /// Returns whether the row was inserted. The lock is held across the
    /// existence check and the append.
    pub fn record(&self, row: SendRow) -> Result<bool, LedgerError> {
        let _lock = self.file_mutex.lock().map_err(|_| LedgerError::LockPoisoned)?;

        if self.contains_row(&row.lesson_id, &row.window)? {
            info!(
                "Send for lesson {} window {} already recorded, skipping insertion",
                row.lesson_id, row.window
            );
            return Ok(false);
        }

        let file = OpenOptions::new().append(true).open(&self.csv_path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(&row)?;
        writer.flush()?;

        info!(
            "Recorded {} send for lesson {}",
            row.window, row.lesson_id
        );
        Ok(true)
    }

    /// All rows for one lesson, in append order.
    pub fn rows_for_lesson(&self, lesson_id: &str) -> Result<Vec<SendRow>, LedgerError> {
        let _lock = self.file_mutex.lock().map_err(|_| LedgerError::LockPoisoned)?;

        let mut rows = Vec::new();
        for row in self.read_rows()? {
            if row.lesson_id == lesson_id {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    // Callers hold the file mutex.
    fn contains_row(&self, lesson_id: &str, window: &str) -> Result<bool, LedgerError> {
        Ok(self
            .read_rows()?
            .iter()
            .any(|row| row.lesson_id == lesson_id && row.window == window))
    }

    fn read_rows(&self) -> Result<Vec<SendRow>, LedgerError> {
        let file = match File::open(&self.csv_path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LedgerError::Io(e)),
        };

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut rows = Vec::new();
        for result in reader.deserialize::<SendRow>() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

// Create a singleton send ledger
pub fn create_send_ledger() -> Arc<SendLedger> {
    // Default path with environment variable override
    let default_path = "/app/data/sent_reminders.csv";
    let csv_path = std::env::var("SEND_LEDGER_PATH").unwrap_or_else(|_| default_path.to_string());

    // Create the data directory if it doesn't exist and we're using the default path
    if csv_path == default_path {
        let dir = std::path::Path::new(default_path).parent().unwrap();
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::error!("Failed to create data directory: {}", e);
            panic!("Failed to create data directory: {}", e);
        }
    }

    Arc::new(SendLedger::new(&csv_path))
}
