//! Call Store (C4): source of truth for call rows and queue rows.
//!
//! Exposed as a `CallStore` trait so the scheduler, reconciler, and tests can
//! be written against an `InMemoryCallStore` test double (grounded on the
//! teacher's `DatabaseManager::new_in_memory()`) without pulling in sqlite.

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::model::call_row::{CallRecording, CallRow};
use crate::model::campaign::Campaign;
use crate::model::contact::Contact;
use crate::model::queue_entry::{QueueEntry, QueueEntryId, QueueEntryStatus};

pub use sqlite::{InMemoryCallStore, SqliteCallStore};

/// A composable conjunction of equality/membership/comparison filters over
/// `QueueEntry` fields. All clauses are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct QueuePredicate {
    pub campaign_id: Option<String>,
    pub statuses: Option<Vec<QueueEntryStatus>>,
    pub scheduled_at_or_before: Option<DateTime<Utc>>,
    pub attempts_less_than_max: bool,
    pub contact_ids: Option<Vec<String>>,
    pub ids: Option<Vec<QueueEntryId>>,
}

impl QueuePredicate {
    pub fn matches(&self, entry: &QueueEntry) -> bool {
        if let Some(campaign_id) = &self.campaign_id {
            if &entry.campaign_id != campaign_id {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&entry.status) {
                return false;
            }
        }
        if let Some(at) = &self.scheduled_at_or_before {
            if entry.scheduled_time > *at {
                return false;
            }
        }
        if self.attempts_less_than_max && entry.attempts >= entry.max_attempts {
            return false;
        }
        if let Some(contact_ids) = &self.contact_ids {
            if !contact_ids.contains(&entry.contact_id) {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(&entry.id) {
                return false;
            }
        }
        true
    }
}

/// Stable sort order for `find_queue_entries`: `priority` DESC, then
/// `scheduled_time` ASC, per §4.4.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOrder;

impl QueueOrder {
    pub fn sort(entries: &mut [QueueEntry]) {
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.scheduled_time.cmp(&b.scheduled_time))
        });
    }
}

/// Partial update applied atomically to a single `QueueEntry`.
#[derive(Debug, Clone, Default)]
pub struct QueueEntryPatch {
    pub status: Option<QueueEntryStatus>,
    pub attempts: Option<u32>,
    pub call_sid: Option<Option<String>>,
    pub last_attempt_status: Option<Option<String>>,
    pub last_attempt_time: Option<Option<DateTime<Utc>>>,
    pub start_time: Option<Option<DateTime<Utc>>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub result: Option<Option<String>>,
    pub result_details: Option<Option<Value>>,
}

impl QueueEntryPatch {
    pub fn apply(self, entry: &mut QueueEntry) {
        if let Some(v) = self.status {
            entry.status = v;
        }
        if let Some(v) = self.attempts {
            entry.attempts = v;
        }
        if let Some(v) = self.call_sid {
            entry.call_sid = v;
        }
        if let Some(v) = self.last_attempt_status {
            entry.last_attempt_status = v;
        }
        if let Some(v) = self.last_attempt_time {
            entry.last_attempt_time = v;
        }
        if let Some(v) = self.start_time {
            entry.start_time = v;
        }
        if let Some(v) = self.end_time {
            entry.end_time = v;
        }
        if let Some(v) = self.scheduled_time {
            entry.scheduled_time = v;
        }
        if let Some(v) = self.result {
            entry.result = v;
        }
        if let Some(v) = self.result_details {
            entry.result_details = v;
        }
    }
}

/// Partial update applied atomically to a single `CallRow`.
#[derive(Debug, Clone, Default)]
pub struct CallRowPatch {
    pub status: Option<crate::model::call_row::CallStatus>,
    pub answer_time: Option<Option<DateTime<Utc>>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<i64>,
    pub recording_url: Option<Option<String>>,
    pub recording_sid: Option<Option<String>>,
    pub amd_result: Option<Option<String>>,
    pub amd_duration: Option<Option<i64>>,
    pub append_event: Option<(String, DateTime<Utc>)>,
}

impl CallRowPatch {
    pub fn apply(self, row: &mut CallRow) {
        if let Some(v) = self.status {
            row.status = v;
        }
        if let Some(v) = self.answer_time {
            row.answer_time = v;
        }
        if let Some(v) = self.end_time {
            row.end_time = v;
        }
        if let Some(v) = self.duration {
            row.duration = v;
        }
        if let Some(v) = self.recording_url {
            row.recording_url = v;
        }
        if let Some(v) = self.recording_sid {
            row.recording_sid = v;
        }
        if let Some(v) = self.amd_result {
            row.amd_result = v;
        }
        if let Some(v) = self.amd_duration {
            row.amd_duration = v;
        }
        if let Some((event_type, at)) = self.append_event {
            row.append_event(&event_type, at);
        }
    }
}

/// Aggregation operators supported by `CallStore::aggregate`.
#[derive(Debug, Clone, Copy)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
}

#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create_call(&self, row: CallRow) -> Result<()>;
    async fn update_call_by_sid(&self, call_sid: &str, patch: CallRowPatch) -> Result<()>;
    async fn find_call_by_sid(&self, call_sid: &str) -> Result<Option<CallRow>>;

    async fn create_recording(&self, recording: CallRecording) -> Result<()>;
    async fn update_recording(&self, recording_sid: &str, patch: CallRecordingPatch) -> Result<()>;

    async fn create_queue_entry(&self, entry: QueueEntry) -> Result<()>;
    async fn update_queue_entry(&self, id: QueueEntryId, patch: QueueEntryPatch) -> Result<()>;
    async fn find_queue_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>>;
    async fn find_queue_entry_by_call_sid(&self, call_sid: &str) -> Result<Option<QueueEntry>>;
    async fn find_queue_entries(
        &self,
        predicate: &QueuePredicate,
        limit: Option<usize>,
    ) -> Result<Vec<QueueEntry>>;
    async fn count_queue_entries(&self, predicate: &QueuePredicate) -> Result<usize>;
    async fn aggregate(&self, campaign_id: &str, field: &str, op: AggregateOp) -> Result<f64>;
}

/// Read-only access to campaigns and contacts. The HTTP/CRUD surface that
/// writes these tables is out of scope (§1); the scheduler only reads.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>>;
    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>>;
    async fn get_contacts(&self, contact_ids: &[String]) -> Result<Vec<Contact>>;
}

/// Partial update applied atomically to a single `CallRecording`.
#[derive(Debug, Clone, Default)]
pub struct CallRecordingPatch {
    pub status: Option<crate::model::call_row::RecordingStatus>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration: Option<i64>,
    pub url: Option<Option<String>>,
}

impl CallRecordingPatch {
    pub fn apply(self, recording: &mut CallRecording) {
        if let Some(v) = self.status {
            recording.status = v;
        }
        if let Some(v) = self.end_time {
            recording.end_time = v;
        }
        if let Some(v) = self.duration {
            recording.duration = v;
        }
        if let Some(v) = self.url {
            recording.url = v;
        }
    }
}
