//! Crate-wide error types.
//!
//! Each subsystem gets its own `thiserror` variant set, aggregated here the
//! way `rvoip_call_engine::error::CallCenterError` aggregates its
//! `DatabaseError`. Public entry points return `Result<T, DialerError>` and
//! never panic or throw out of library code.

use crate::model::queue_entry::QueueEntryId;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DialerError>;

#[derive(thiserror::Error, Debug)]
pub enum DialerError {
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    #[error("queue entry not found: {0:?}")]
    QueueEntryNotFound(QueueEntryId),

    #[error("call not found: {0}")]
    CallNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("telephony provider error: {0}")]
    Telephony(#[from] TelephonyError),

    #[error("speech provider error: {0}")]
    Speech(#[from] SpeechError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl DialerError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}

/// Call Store (C4) failures. `Store Failure` per the error handling design:
/// propagated to the caller; the scheduler treats it as transient.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("row not found")]
    NotFound,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(_) => StoreError::Query(err.to_string()),
            sqlx::Error::Io(_) => StoreError::Connection(err.to_string()),
            sqlx::Error::Configuration(_) => StoreError::Connection(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Telephony provider collaborator failures. `Provider Transient` (timeout,
/// 5xx, 429) is retryable and delegated to the Retry Planner; everything
/// else is `Provider Permanent`.
#[derive(thiserror::Error, Debug)]
pub enum TelephonyError {
    #[error("request timed out")]
    Timeout,

    #[error("transient provider failure ({status}): {message}")]
    Transient { status: u16, message: String },

    #[error("permanent provider failure ({status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl TelephonyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TelephonyError::Timeout | TelephonyError::Transient { .. })
    }
}

/// Speech provider (STT/TTS) collaborator failures.
#[derive(thiserror::Error, Debug)]
pub enum SpeechError {
    #[error("request timed out")]
    Timeout,

    #[error("transient provider failure ({status}): {message}")]
    Transient { status: u16, message: String },

    #[error("permanent provider failure ({status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("missing credentials")]
    MissingCredentials,

    #[error("missing webhook url")]
    MissingWebhookUrl,
}

impl SpeechError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpeechError::Timeout | SpeechError::Transient { .. })
    }
}

/// Codec Kernel (C1) failures. These are always locally recovered —
/// the caller drops the frame and continues.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}
