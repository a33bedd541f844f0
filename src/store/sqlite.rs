//! `SqliteCallStore`: a `sqlx`-backed `SqlitePool` with `sqlx::migrate!` run
//! at connect time, following `rvoip_call_engine::database::DatabaseManager`.
//! `InMemoryCallStore` is a `dashmap`/`parking_lot` test double for unit
//! tests that don't want a real pool, grounded on the teacher's
//! `DatabaseManager::new_in_memory()` helper.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use sqlx::{Row, SqlitePool};

use super::{AggregateOp, CallRecordingPatch, CallRowPatch, CallStore, CampaignStore, QueueEntryPatch, QueueOrder, QueuePredicate};
use crate::error::{Result, StoreError};
use crate::model::call_row::{CallDirection, CallRecording, CallRow, CallStatus, RecordingStatus};
use crate::model::campaign::{Campaign, CampaignStatus};
use crate::model::contact::Contact;
use crate::model::queue_entry::{QueueEntry, QueueEntryId, QueueEntryStatus};

/// Source of truth for call rows and queue rows, backed by SQLite.
#[derive(Clone)]
pub struct SqliteCallStore {
    pool: SqlitePool,
}

impl SqliteCallStore {
    /// Connect and run migrations. `database_url` may be `:memory:`,
    /// `sqlite::memory:`, or a file path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = if database_url.contains("://") {
            database_url.to_string()
        } else {
            format!("sqlite:{database_url}")
        };

        tracing::info!(url = %url, "connecting call store");
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn call_row_from_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<CallRow, sqlx::Error> {
        let direction_str: String = row.try_get("direction")?;
        let status_str: String = row.try_get("status")?;
        let metadata_str: String = row.try_get("metadata")?;

        Ok(CallRow {
            call_sid: row.try_get("call_sid")?,
            campaign_id: row.try_get("campaign_id")?,
            contact_id: row.try_get("contact_id")?,
            direction: if direction_str == "inbound" {
                CallDirection::Inbound
            } else {
                CallDirection::Outbound
            },
            status: CallStatus::from_str(&status_str).unwrap_or(CallStatus::Initiated),
            from: row.try_get("from_number")?,
            to: row.try_get("to_number")?,
            start_time: row.try_get("start_time")?,
            answer_time: row.try_get("answer_time")?,
            end_time: row.try_get("end_time")?,
            duration: row.try_get("duration")?,
            recording_url: row.try_get("recording_url")?,
            recording_sid: row.try_get("recording_sid")?,
            amd_result: row.try_get("amd_result")?,
            amd_duration: row.try_get("amd_duration")?,
            metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::json!({"events": []})),
        })
    }

    fn queue_entry_from_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<QueueEntry, sqlx::Error> {
        let id_str: String = row.try_get("id")?;
        let status_str: String = row.try_get("status")?;
        let metadata_str: String = row.try_get("metadata")?;
        let result_details_str: Option<String> = row.try_get("result_details")?;

        Ok(QueueEntry {
            id: QueueEntryId(uuid::Uuid::parse_str(&id_str).unwrap_or_default()),
            campaign_id: row.try_get("campaign_id")?,
            contact_id: row.try_get("contact_id")?,
            phone: row.try_get("phone")?,
            caller_id: row.try_get("caller_id")?,
            phone_number_id: row.try_get("phone_number_id")?,
            status: queue_status_from_str(&status_str),
            priority: row.try_get("priority")?,
            scheduled_time: row.try_get("scheduled_time")?,
            attempts: row.try_get::<i64, _>("attempts")? as u32,
            max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
            use_amd: row.try_get("use_amd")?,
            retry_on_machine: row.try_get("retry_on_machine")?,
            call_sid: row.try_get("call_sid")?,
            last_attempt_status: row.try_get("last_attempt_status")?,
            last_attempt_time: row.try_get("last_attempt_time")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            result: row.try_get("result")?,
            result_details: result_details_str.and_then(|s| serde_json::from_str(&s).ok()),
            metadata: serde_json::from_str(&metadata_str).unwrap_or(serde_json::Value::Null),
        })
    }
}

fn queue_status_from_str(s: &str) -> QueueEntryStatus {
    match s {
        "scheduled" => QueueEntryStatus::Scheduled,
        "in-progress" => QueueEntryStatus::InProgress,
        "retry" => QueueEntryStatus::Retry,
        "completed" => QueueEntryStatus::Completed,
        "failed" => QueueEntryStatus::Failed,
        "cancelled" => QueueEntryStatus::Cancelled,
        _ => QueueEntryStatus::Scheduled,
    }
}

fn queue_status_as_str(status: QueueEntryStatus) -> &'static str {
    match status {
        QueueEntryStatus::Scheduled => "scheduled",
        QueueEntryStatus::InProgress => "in-progress",
        QueueEntryStatus::Retry => "retry",
        QueueEntryStatus::Completed => "completed",
        QueueEntryStatus::Failed => "failed",
        QueueEntryStatus::Cancelled => "cancelled",
    }
}

#[async_trait]
impl CallStore for SqliteCallStore {
    async fn create_call(&self, row: CallRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO call_logs
             (call_sid, campaign_id, contact_id, direction, status, from_number, to_number,
              start_time, answer_time, end_time, duration, recording_url, recording_sid,
              amd_result, amd_duration, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.call_sid)
        .bind(&row.campaign_id)
        .bind(&row.contact_id)
        .bind(if row.direction == CallDirection::Inbound { "inbound" } else { "outbound" })
        .bind(row.status.as_str())
        .bind(&row.from)
        .bind(&row.to)
        .bind(row.start_time)
        .bind(row.answer_time)
        .bind(row.end_time)
        .bind(row.duration)
        .bind(&row.recording_url)
        .bind(&row.recording_sid)
        .bind(&row.amd_result)
        .bind(row.amd_duration)
        .bind(row.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn update_call_by_sid(&self, call_sid: &str, patch: CallRowPatch) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Transaction(e.to_string()))?;
        let row = sqlx::query("SELECT * FROM call_logs WHERE call_sid = ?")
            .bind(call_sid)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?
            .ok_or(StoreError::NotFound)?;
        let mut call = Self::call_row_from_row(&row).map_err(StoreError::from)?;
        patch.apply(&mut call);

        sqlx::query(
            "UPDATE call_logs SET status = ?, answer_time = ?, end_time = ?, duration = ?,
             recording_url = ?, recording_sid = ?, amd_result = ?, amd_duration = ?, metadata = ?
             WHERE call_sid = ?",
        )
        .bind(call.status.as_str())
        .bind(call.answer_time)
        .bind(call.end_time)
        .bind(call.duration)
        .bind(&call.recording_url)
        .bind(&call.recording_sid)
        .bind(&call.amd_result)
        .bind(call.amd_duration)
        .bind(call.metadata.to_string())
        .bind(call_sid)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn find_call_by_sid(&self, call_sid: &str) -> Result<Option<CallRow>> {
        let row = sqlx::query("SELECT * FROM call_logs WHERE call_sid = ?")
            .bind(call_sid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(Self::call_row_from_row(&row).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn create_recording(&self, recording: CallRecording) -> Result<()> {
        sqlx::query(
            "INSERT INTO call_recordings (recording_sid, call_sid, status, start_time, end_time, duration, url)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&recording.recording_sid)
        .bind(&recording.call_sid)
        .bind(if recording.status == RecordingStatus::Completed { "completed" } else { "in-progress" })
        .bind(recording.start_time)
        .bind(recording.end_time)
        .bind(recording.duration)
        .bind(&recording.url)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn update_recording(&self, recording_sid: &str, patch: CallRecordingPatch) -> Result<()> {
        let row = sqlx::query("SELECT * FROM call_recordings WHERE recording_sid = ?")
            .bind(recording_sid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?
            .ok_or(StoreError::NotFound)?;

        let status_str: String = row.try_get("status").map_err(StoreError::from)?;
        let mut recording = CallRecording {
            recording_sid: row.try_get("recording_sid").map_err(StoreError::from)?,
            call_sid: row.try_get("call_sid").map_err(StoreError::from)?,
            status: if status_str == "completed" { RecordingStatus::Completed } else { RecordingStatus::InProgress },
            start_time: row.try_get("start_time").map_err(StoreError::from)?,
            end_time: row.try_get("end_time").map_err(StoreError::from)?,
            duration: row.try_get("duration").map_err(StoreError::from)?,
            url: row.try_get("url").map_err(StoreError::from)?,
        };
        patch.apply(&mut recording);

        sqlx::query("UPDATE call_recordings SET status = ?, end_time = ?, duration = ?, url = ? WHERE recording_sid = ?")
            .bind(if recording.status == RecordingStatus::Completed { "completed" } else { "in-progress" })
            .bind(recording.end_time)
            .bind(recording.duration)
            .bind(&recording.url)
            .bind(recording_sid)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn create_queue_entry(&self, entry: QueueEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO call_queue
             (id, campaign_id, contact_id, phone, caller_id, phone_number_id, status, priority,
              scheduled_time, attempts, max_attempts, use_amd, retry_on_machine, call_sid,
              last_attempt_status, last_attempt_time, start_time, end_time, result, result_details, metadata)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.0.to_string())
        .bind(&entry.campaign_id)
        .bind(&entry.contact_id)
        .bind(&entry.phone)
        .bind(&entry.caller_id)
        .bind(&entry.phone_number_id)
        .bind(queue_status_as_str(entry.status))
        .bind(entry.priority)
        .bind(entry.scheduled_time)
        .bind(entry.attempts as i64)
        .bind(entry.max_attempts as i64)
        .bind(entry.use_amd)
        .bind(entry.retry_on_machine)
        .bind(&entry.call_sid)
        .bind(&entry.last_attempt_status)
        .bind(entry.last_attempt_time)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(&entry.result)
        .bind(entry.result_details.as_ref().map(|v| v.to_string()))
        .bind(entry.metadata.to_string())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn update_queue_entry(&self, id: QueueEntryId, patch: QueueEntryPatch) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Transaction(e.to_string()))?;
        let row = sqlx::query("SELECT * FROM call_queue WHERE id = ?")
            .bind(id.0.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?
            .ok_or(StoreError::NotFound)?;
        let mut entry = Self::queue_entry_from_row(&row).map_err(StoreError::from)?;
        patch.apply(&mut entry);

        sqlx::query(
            "UPDATE call_queue SET status = ?, attempts = ?, call_sid = ?, last_attempt_status = ?,
             last_attempt_time = ?, start_time = ?, end_time = ?, scheduled_time = ?, result = ?,
             result_details = ? WHERE id = ?",
        )
        .bind(queue_status_as_str(entry.status))
        .bind(entry.attempts as i64)
        .bind(&entry.call_sid)
        .bind(&entry.last_attempt_status)
        .bind(entry.last_attempt_time)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.scheduled_time)
        .bind(&entry.result)
        .bind(entry.result_details.as_ref().map(|v| v.to_string()))
        .bind(id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn find_queue_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>> {
        let row = sqlx::query("SELECT * FROM call_queue WHERE id = ?")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(Self::queue_entry_from_row(&row).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn find_queue_entry_by_call_sid(&self, call_sid: &str) -> Result<Option<QueueEntry>> {
        let row = sqlx::query("SELECT * FROM call_queue WHERE call_sid = ?")
            .bind(call_sid)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(Self::queue_entry_from_row(&row).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn find_queue_entries(&self, predicate: &QueuePredicate, limit: Option<usize>) -> Result<Vec<QueueEntry>> {
        // Predicates are composed in memory: the `call_queue` table is
        // expected to stay small enough per campaign that a full scan plus
        // filter is cheaper than building dynamic SQL per predicate shape.
        let rows = sqlx::query("SELECT * FROM call_queue")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(Self::queue_entry_from_row(row).map_err(StoreError::from)?);
        }
        entries.retain(|e| predicate.matches(e));
        QueueOrder::sort(&mut entries);
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn count_queue_entries(&self, predicate: &QueuePredicate) -> Result<usize> {
        Ok(self.find_queue_entries(predicate, None).await?.len())
    }

    async fn aggregate(&self, campaign_id: &str, field: &str, op: AggregateOp) -> Result<f64> {
        let predicate = QueuePredicate {
            campaign_id: Some(campaign_id.to_string()),
            ..Default::default()
        };
        let entries = self.find_queue_entries(&predicate, None).await?;

        let values: Vec<f64> = entries
            .iter()
            .filter_map(|e| match field {
                "attempts" => Some(e.attempts as f64),
                "priority" => Some(e.priority as f64),
                _ => None,
            })
            .collect();

        Ok(match op {
            AggregateOp::Count => values.len() as f64,
            AggregateOp::Sum => values.iter().sum(),
            AggregateOp::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
        })
    }
}

fn campaign_from_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<Campaign, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    Ok(Campaign {
        id: row.try_get("id")?,
        status: match status_str.as_str() {
            "paused" => CampaignStatus::Paused,
            "completed" => CampaignStatus::Completed,
            "failed" => CampaignStatus::Failed,
            _ => CampaignStatus::Active,
        },
        caller_id: row.try_get("caller_id")?,
        phone_number_id: row.try_get("phone_number_id")?,
        max_concurrent_calls: row.try_get::<i64, _>("max_concurrent_calls")? as u32,
        retry_delay_minutes: row.try_get::<i64, _>("retry_delay_minutes")? as u32,
        retry_exponential_factor: row.try_get("retry_exponential_factor")?,
        webhook_url: row.try_get("webhook_url")?,
        call_hours_start: row.try_get::<Option<i64>, _>("call_hours_start")?.map(|v| v as u32),
        call_hours_end: row.try_get::<Option<i64>, _>("call_hours_end")?.map(|v| v as u32),
    })
}

#[async_trait]
impl CampaignStore for SqliteCallStore {
    async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
            .bind(campaign_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(campaign_from_row(&row).map_err(StoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>> {
        let rows = sqlx::query("SELECT * FROM campaigns WHERE status = 'active'")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.iter().map(|r| campaign_from_row(r).map_err(StoreError::from)).collect()
    }

    async fn get_contacts(&self, contact_ids: &[String]) -> Result<Vec<Contact>> {
        let mut contacts = Vec::with_capacity(contact_ids.len());
        for id in contact_ids {
            let row = sqlx::query("SELECT * FROM contacts WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::from)?;
            if let Some(row) = row {
                contacts.push(Contact {
                    id: row.try_get("id").map_err(StoreError::from)?,
                    phone: row.try_get("phone").map_err(StoreError::from)?,
                    name: row.try_get("name").map_err(StoreError::from)?,
                    email: row.try_get("email").map_err(StoreError::from)?,
                });
            }
        }
        Ok(contacts)
    }
}

/// In-memory test double. Not production storage: data does not survive
/// process exit and there is no migration story.
#[derive(Default)]
pub struct InMemoryCallStore {
    calls: DashMap<String, CallRow>,
    recordings: DashMap<String, CallRecording>,
    queue: DashMap<QueueEntryId, QueueEntry>,
    call_sid_index: Mutex<std::collections::HashMap<String, QueueEntryId>>,
    campaigns: DashMap<String, Campaign>,
    contacts: DashMap<String, Contact>,
}

impl InMemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a campaign for tests; the real CRUD surface is out of scope.
    pub fn seed_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id.clone(), campaign);
    }

    pub fn seed_contact(&self, contact: Contact) {
        self.contacts.insert(contact.id.clone(), contact);
    }
}

#[async_trait]
impl CampaignStore for InMemoryCallStore {
    async fn get_campaign(&self, campaign_id: &str) -> Result<Option<Campaign>> {
        Ok(self.campaigns.get(campaign_id).map(|c| c.clone()))
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>> {
        Ok(self
            .campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .map(|c| c.value().clone())
            .collect())
    }

    async fn get_contacts(&self, contact_ids: &[String]) -> Result<Vec<Contact>> {
        Ok(contact_ids.iter().filter_map(|id| self.contacts.get(id).map(|c| c.clone())).collect())
    }
}

#[async_trait]
impl CallStore for InMemoryCallStore {
    async fn create_call(&self, row: CallRow) -> Result<()> {
        self.calls.insert(row.call_sid.clone(), row);
        Ok(())
    }

    async fn update_call_by_sid(&self, call_sid: &str, patch: CallRowPatch) -> Result<()> {
        let mut entry = self.calls.get_mut(call_sid).ok_or(StoreError::NotFound)?;
        patch.apply(&mut entry);
        Ok(())
    }

    async fn find_call_by_sid(&self, call_sid: &str) -> Result<Option<CallRow>> {
        Ok(self.calls.get(call_sid).map(|r| r.clone()))
    }

    async fn create_recording(&self, recording: CallRecording) -> Result<()> {
        self.recordings.insert(recording.recording_sid.clone(), recording);
        Ok(())
    }

    async fn update_recording(&self, recording_sid: &str, patch: CallRecordingPatch) -> Result<()> {
        let mut entry = self.recordings.get_mut(recording_sid).ok_or(StoreError::NotFound)?;
        patch.apply(&mut entry);
        Ok(())
    }

    async fn create_queue_entry(&self, entry: QueueEntry) -> Result<()> {
        if let Some(call_sid) = &entry.call_sid {
            self.call_sid_index.lock().insert(call_sid.clone(), entry.id);
        }
        self.queue.insert(entry.id, entry);
        Ok(())
    }

    async fn update_queue_entry(&self, id: QueueEntryId, patch: QueueEntryPatch) -> Result<()> {
        let mut entry = self.queue.get_mut(&id).ok_or(StoreError::NotFound)?;
        let new_call_sid = patch.call_sid.clone();
        patch.apply(&mut entry);
        if let Some(Some(call_sid)) = new_call_sid {
            self.call_sid_index.lock().insert(call_sid, id);
        }
        Ok(())
    }

    async fn find_queue_entry(&self, id: QueueEntryId) -> Result<Option<QueueEntry>> {
        Ok(self.queue.get(&id).map(|e| e.clone()))
    }

    async fn find_queue_entry_by_call_sid(&self, call_sid: &str) -> Result<Option<QueueEntry>> {
        let id = self.call_sid_index.lock().get(call_sid).copied();
        match id {
            Some(id) => self.find_queue_entry(id).await,
            None => Ok(None),
        }
    }

    async fn find_queue_entries(&self, predicate: &QueuePredicate, limit: Option<usize>) -> Result<Vec<QueueEntry>> {
        let mut entries: Vec<QueueEntry> = self
            .queue
            .iter()
            .map(|e| e.value().clone())
            .filter(|e| predicate.matches(e))
            .collect();
        QueueOrder::sort(&mut entries);
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    async fn count_queue_entries(&self, predicate: &QueuePredicate) -> Result<usize> {
        Ok(self.queue.iter().filter(|e| predicate.matches(e.value())).count())
    }

    async fn aggregate(&self, campaign_id: &str, field: &str, op: AggregateOp) -> Result<f64> {
        let predicate = QueuePredicate {
            campaign_id: Some(campaign_id.to_string()),
            ..Default::default()
        };
        let entries = self.find_queue_entries(&predicate, None).await?;
        let values: Vec<f64> = entries
            .iter()
            .filter_map(|e| match field {
                "attempts" => Some(e.attempts as f64),
                "priority" => Some(e.priority as f64),
                _ => None,
            })
            .collect();
        Ok(match op {
            AggregateOp::Count => values.len() as f64,
            AggregateOp::Sum => values.iter().sum(),
            AggregateOp::Avg => {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::call_row::CallDirection;
    use chrono::Utc;

    #[tokio::test]
    async fn in_memory_store_round_trips_a_call() {
        let store = InMemoryCallStore::new();
        let row = CallRow::new("CA1", CallDirection::Outbound, "+15550000000", "+15551111111");
        store.create_call(row.clone()).await.unwrap();

        let found = store.find_call_by_sid("CA1").await.unwrap().unwrap();
        assert_eq!(found.call_sid, "CA1");
    }

    #[tokio::test]
    async fn in_memory_store_orders_queue_entries_by_priority_then_time() {
        let store = InMemoryCallStore::new();
        let now = Utc::now();
        let low = QueueEntry::new("camp-1", "c1", "+1", "+1", None, 1, now, 3, true, serde_json::json!({}));
        let high = QueueEntry::new("camp-1", "c2", "+1", "+1", None, 10, now, 3, true, serde_json::json!({}));
        store.create_queue_entry(low).await.unwrap();
        store.create_queue_entry(high.clone()).await.unwrap();

        let predicate = QueuePredicate { campaign_id: Some("camp-1".into()), ..Default::default() };
        let entries = store.find_queue_entries(&predicate, None).await.unwrap();
        assert_eq!(entries[0].id, high.id);
    }

    #[tokio::test]
    async fn update_queue_entry_missing_id_errors() {
        let store = InMemoryCallStore::new();
        let result = store.update_queue_entry(QueueEntryId::new(), QueueEntryPatch::default()).await;
        assert!(result.is_err());
    }
}
