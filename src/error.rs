use thiserror::Error;

/// Failure to turn a stored start-time label into a usable time of day.
///
/// Labels are stored as free text, so every variant carries the offending
/// label for log output.
#[derive(Debug, Error)]
pub enum TimeLabelError {
    #[error("time label '{label}' has no ':' separator")]
    MissingColon { label: String },

    #[error("time label '{label}' has a non-numeric hour or minute")]
    NotNumeric { label: String },

    #[error("time label '{label}' does not resolve to a valid time of day")]
    OutOfRange { label: String },
}

/// Errors from the lesson store HTTP API.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lesson store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lesson store returned status {status}")]
    Unexpected { status: u16 },

    #[error("{kind} '{id}' not found in lesson store")]
    NotFound { kind: &'static str, id: String },
}

/// Errors from the mail delivery API.
#[derive(Debug, Error)]
pub enum MailApiError {
    #[error("mail transport request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail transport rejected the message with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

/// Errors from the conference provider API.
#[derive(Debug, Error)]
pub enum ConferenceApiError {
    #[error("conference provider is not configured")]
    NotConfigured,

    #[error("conference provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("conference provider returned status {status}")]
    Unexpected { status: u16 },

    #[error("conference provider response carried no join url")]
    MissingJoinUrl,

    #[error("failed to encode meeting request: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from the durable send ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("send ledger file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("send ledger row error: {0}")]
    Csv(#[from] csv::Error),

    #[error("send ledger lock poisoned")]
    LockPoisoned,
}

/// Errors that abort a whole scheduler pass.
///
/// Per-lesson problems (bad labels, missing users) are logged and skipped
/// instead; only the shared dependencies of a pass surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("lesson source unavailable: {0}")]
    SourceUnavailable(#[from] StoreError),

    #[error("send ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),
}
