//! The scheduler's unit of work. Created by `scheduleBatch`, mutated only
//! by the Scheduler and Retry Planner; terminal states are final.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueEntryId(pub uuid::Uuid);

impl QueueEntryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for QueueEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueEntryStatus {
    Scheduled,
    InProgress,
    Retry,
    Completed,
    Failed,
    Cancelled,
}

impl QueueEntryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueEntryStatus::Completed | QueueEntryStatus::Failed | QueueEntryStatus::Cancelled
        )
    }

    pub fn is_dispatchable(self) -> bool {
        matches!(self, QueueEntryStatus::Scheduled | QueueEntryStatus::Retry)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub campaign_id: String,
    pub contact_id: String,
    pub phone: String,
    pub caller_id: String,
    pub phone_number_id: Option<String>,
    pub status: QueueEntryStatus,
    pub priority: i32,
    pub scheduled_time: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub use_amd: bool,
    /// Explicit, never inferred from `retry_on` — see Design Notes.
    pub retry_on_machine: bool,
    pub call_sid: Option<String>,
    pub last_attempt_status: Option<String>,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub result_details: Option<Value>,
    pub metadata: Value,
}

impl QueueEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_id: impl Into<String>,
        contact_id: impl Into<String>,
        phone: impl Into<String>,
        caller_id: impl Into<String>,
        phone_number_id: Option<String>,
        priority: i32,
        scheduled_time: DateTime<Utc>,
        max_attempts: u32,
        use_amd: bool,
        metadata: Value,
    ) -> Self {
        Self {
            id: QueueEntryId::new(),
            campaign_id: campaign_id.into(),
            contact_id: contact_id.into(),
            phone: phone.into(),
            caller_id: caller_id.into(),
            phone_number_id,
            status: QueueEntryStatus::Scheduled,
            priority,
            scheduled_time,
            attempts: 0,
            max_attempts,
            use_amd,
            retry_on_machine: false,
            call_sid: None,
            last_attempt_status: None,
            last_attempt_time: None,
            start_time: None,
            end_time: None,
            result: None,
            result_details: None,
            metadata,
        }
    }

    /// `attempts ≤ max_attempts` invariant (§3, §8 property 1).
    pub fn invariant_attempts_within_bound(&self) -> bool {
        self.attempts <= self.max_attempts
    }

    /// `status = in-progress ⇒ call_sid ≠ null ∧ start_time ≠ null`.
    pub fn invariant_in_progress_requires_sid_and_start(&self) -> bool {
        if self.status != QueueEntryStatus::InProgress {
            return true;
        }
        self.call_sid.is_some() && self.start_time.is_some()
    }

    /// `status ∈ {completed, failed, cancelled} ⇒ end_time ≠ null`.
    pub fn invariant_terminal_requires_end_time(&self) -> bool {
        if !self.status.is_terminal() {
            return true;
        }
        self.end_time.is_some()
    }
}
