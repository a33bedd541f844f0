//! Scheduler (C7): owns the queue, admits and dispatches calls under
//! per-campaign concurrency caps and pacing.
//!
//! Dispatch is single-writer per campaign via a `tokio::sync::Mutex` keyed
//! by campaign id (grounded on the teacher's `RwLock`/`Mutex`-guarded
//! `CallCenterState`, and on the rule in §5 that the dispatch task must
//! never hold that mutex across a telephony RPC).

pub mod retry;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Timelike, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::DialerConfig;
use crate::error::{DialerError, Result};
use crate::events::Bus;
use crate::model::call_row::{CallDirection, CallRow, CallStatus};
use crate::model::campaign::Campaign;
use crate::model::queue_entry::{QueueEntry, QueueEntryId, QueueEntryStatus};
use crate::reconcile::CallCompletionSink;
use crate::store::{CallRowPatch, CallStore, CampaignStore, QueueEntryPatch, QueuePredicate};
use crate::telephony::TelephonyProvider;

/// Options merged with defaults in `schedule_batch` (§4.7).
#[derive(Debug, Clone)]
pub struct ScheduleBatchOptions {
    pub max_concurrent: u32,
    pub call_delay_ms: u64,
    pub use_amd: bool,
    pub max_retries: u32,
    pub retry_on: HashSet<String>,
}

impl Default for ScheduleBatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            call_delay_ms: 2000,
            use_amd: true,
            max_retries: 3,
            retry_on: ["busy", "no-answer", "failed"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleBatchResult {
    pub scheduled_calls: usize,
    pub queued_calls: usize,
    pub options: ScheduleBatchOptions,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessQueueResult {
    pub processed: usize,
    pub initiated: usize,
    pub retries: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CancelFilter {
    pub campaign_id: Option<String>,
    pub contact_ids: Option<Vec<String>>,
    pub queue_ids: Option<Vec<QueueEntryId>>,
}

pub struct Scheduler<S> {
    store: Arc<S>,
    telephony: Arc<dyn TelephonyProvider>,
    bus: Arc<Bus>,
    config: Arc<DialerConfig>,
    campaign_locks: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            telephony: self.telephony.clone(),
            bus: self.bus.clone(),
            config: self.config.clone(),
            campaign_locks: self.campaign_locks.clone(),
        }
    }
}

impl<S: CallStore + CampaignStore + 'static> Scheduler<S> {
    pub fn new(store: Arc<S>, telephony: Arc<dyn TelephonyProvider>, bus: Arc<Bus>, config: Arc<DialerConfig>) -> Self {
        Self { store, telephony, bus, config, campaign_locks: Arc::new(DashMap::new()) }
    }

    fn campaign_lock(&self, campaign_id: &str) -> Arc<AsyncMutex<()>> {
        self.campaign_locks.entry(campaign_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// `schedule_batch` (§4.7): validates the campaign, creates one
    /// `QueueEntry` per contact, then triggers one immediate
    /// `process_queue` for responsiveness.
    pub async fn schedule_batch(
        &self,
        campaign_id: &str,
        contact_ids: &[String],
        options: Option<ScheduleBatchOptions>,
    ) -> Result<ScheduleBatchResult> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| DialerError::CampaignNotFound(campaign_id.to_string()))?;

        let options = options.unwrap_or_default();
        let contacts = self.store.get_contacts(contact_ids).await?;
        let now = Utc::now();

        for (i, contact) in contacts.iter().enumerate() {
            let scheduled_time = now + chrono::Duration::milliseconds((i as u64 * options.call_delay_ms) as i64);
            let metadata = serde_json::json!({ "name": contact.name, "email": contact.email });
            let entry = QueueEntry::new(
                campaign_id,
                contact.id.clone(),
                contact.phone.clone(),
                campaign.caller_id.clone(),
                campaign.phone_number_id.clone(),
                0,
                scheduled_time,
                options.max_retries,
                options.use_amd,
                metadata,
            );
            self.store.create_queue_entry(entry).await?;
        }

        let scheduled_calls = contacts.len();
        let outcome = self.process_campaign(campaign_id, Some(options.max_concurrent)).await?;
        let queued_calls = scheduled_calls.saturating_sub(outcome.initiated);

        Ok(ScheduleBatchResult { scheduled_calls, queued_calls, options })
    }

    /// `process_queue` (§4.7). If `campaign_id` is `None`, iterates every
    /// campaign with `status=active`.
    pub async fn process_queue(&self, campaign_id: Option<&str>) -> Result<ProcessQueueResult> {
        let campaigns = match campaign_id {
            Some(id) => match self.store.get_campaign(id).await? {
                Some(campaign) => vec![campaign],
                None => return Err(DialerError::CampaignNotFound(id.to_string())),
            },
            None => self.store.list_active_campaigns().await?,
        };

        let mut total = ProcessQueueResult::default();
        for campaign in campaigns {
            let result = self.process_campaign(&campaign.id, None).await?;
            total.processed += result.processed;
            total.initiated += result.initiated;
            total.retries += result.retries;
            total.failed += result.failed;
        }
        Ok(total)
    }

    /// Dispatches for one campaign. `override_cap`, when given, additionally
    /// bounds the slot count below `campaign.max_concurrent_calls` — used by
    /// `schedule_batch`'s `initiate_batch(campaign_id, max_concurrent)` call
    /// (§4.7) so a batch's own `max_concurrent` option can't out-dispatch
    /// the campaign's standing cap.
    ///
    /// The per-campaign mutex is held only to reserve slots (select
    /// candidates and flip them to in-progress); it is released before any
    /// telephony RPC runs, and `dispatch_one` reacquires it only for the
    /// short confirmation write once the RPC returns (§5).
    async fn process_campaign(&self, campaign_id: &str, override_cap: Option<u32>) -> Result<ProcessQueueResult> {
        let (campaign, reserved) = {
            let lock = self.campaign_lock(campaign_id);
            let _guard = lock.lock().await;

            let campaign = self
                .store
                .get_campaign(campaign_id)
                .await?
                .ok_or_else(|| DialerError::CampaignNotFound(campaign_id.to_string()))?;

            let current_hour = Utc::now().hour();
            if !campaign.within_call_hours(current_hour) {
                return Ok(ProcessQueueResult::default());
            }

            let in_progress_predicate = QueuePredicate {
                campaign_id: Some(campaign_id.to_string()),
                statuses: Some(vec![QueueEntryStatus::InProgress]),
                ..Default::default()
            };
            let in_progress = self.store.count_queue_entries(&in_progress_predicate).await?;
            let cap = override_cap.map_or(campaign.max_concurrent_calls, |c| c.min(campaign.max_concurrent_calls));
            let slots = (cap as usize).saturating_sub(in_progress);
            if slots == 0 {
                return Ok(ProcessQueueResult::default());
            }

            let dispatchable_predicate = QueuePredicate {
                campaign_id: Some(campaign_id.to_string()),
                statuses: Some(vec![QueueEntryStatus::Scheduled, QueueEntryStatus::Retry]),
                scheduled_at_or_before: Some(Utc::now()),
                attempts_less_than_max: true,
                ..Default::default()
            };
            let candidates = self.store.find_queue_entries(&dispatchable_predicate, Some(slots)).await?;

            let mut reserved = Vec::with_capacity(candidates.len());
            for entry in candidates {
                let next_attempts = entry.attempts + 1;
                self.store
                    .update_queue_entry(
                        entry.id,
                        QueueEntryPatch {
                            status: Some(QueueEntryStatus::InProgress),
                            attempts: Some(next_attempts),
                            start_time: Some(Some(Utc::now())),
                            ..Default::default()
                        },
                    )
                    .await?;

                let mut reserved_entry = entry;
                reserved_entry.attempts = next_attempts;
                reserved.push(reserved_entry);
            }

            (campaign, reserved)
        };

        let mut result = ProcessQueueResult::default();
        result.processed = reserved.len();
        for entry in reserved {
            self.dispatch_one(campaign_id, &campaign, entry, &mut result).await?;
        }
        Ok(result)
    }

    /// Performs the telephony RPC with no campaign lock held, then
    /// reacquires the lock only to write the outcome (§5).
    async fn dispatch_one(&self, campaign_id: &str, campaign: &Campaign, entry: QueueEntry, result: &mut ProcessQueueResult) -> Result<()> {
        let webhook_url = campaign
            .webhook_url
            .clone()
            .or_else(|| self.config.general.public_url.clone())
            .unwrap_or_default();

        let placement = self
            .telephony
            .place_call(&entry.phone, &entry.caller_id, &webhook_url, serde_json::json!({}), campaign.phone_number_id.as_deref())
            .await;

        let lock = self.campaign_lock(campaign_id);
        let _guard = lock.lock().await;

        match placement {
            Ok(placed) => {
                self.store
                    .update_queue_entry(entry.id, QueueEntryPatch { call_sid: Some(Some(placed.id.clone())), ..Default::default() })
                    .await?;

                let mut row = CallRow::new(placed.id.clone(), CallDirection::Outbound, entry.caller_id.clone(), entry.phone.clone());
                row.campaign_id = Some(campaign.id.clone());
                row.contact_id = Some(entry.contact_id.clone());
                self.store.create_call(row).await?;

                result.initiated += 1;
            }
            Err(err) => {
                tracing::warn!(campaign_id = %campaign.id, contact_id = %entry.contact_id, error = %err, "telephony placement failed");

                match retry::plan(campaign, &entry, CallStatus::Failed, None) {
                    retry::RetryDecision::Retry { patch } => {
                        self.store.update_queue_entry(entry.id, patch).await?;
                        result.retries += 1;
                    }
                    retry::RetryDecision::Finalize { patch, .. } => {
                        self.store.update_queue_entry(entry.id, patch).await?;
                        result.failed += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// `cancel_scheduled_calls` (§4.7): transitions matching entries in
    /// `{scheduled, retry}` to `cancelled`. In-progress calls are untouched.
    pub async fn cancel_scheduled_calls(&self, filter: CancelFilter) -> Result<usize> {
        let predicate = QueuePredicate {
            campaign_id: filter.campaign_id,
            statuses: Some(vec![QueueEntryStatus::Scheduled, QueueEntryStatus::Retry]),
            contact_ids: filter.contact_ids,
            ids: filter.queue_ids,
            ..Default::default()
        };
        let entries = self.store.find_queue_entries(&predicate, None).await?;
        let count = entries.len();

        for entry in entries {
            self.store
                .update_queue_entry(
                    entry.id,
                    QueueEntryPatch { status: Some(QueueEntryStatus::Cancelled), end_time: Some(Some(Utc::now())), ..Default::default() },
                )
                .await?;
        }
        Ok(count)
    }

    /// `on_call_completed` (§4.7): the Reconciler's entry point. Idempotent
    /// once the entry has reached a terminal state (property 6, §8).
    pub async fn on_call_completed(&self, call_sid: &str, status: CallStatus, details: &Value) -> Result<()> {
        let Some(entry) = self.store.find_queue_entry_by_call_sid(call_sid).await? else {
            tracing::error!(call_sid = %call_sid, "on_call_completed invoked for a call with no queue entry");
            return Ok(());
        };

        if entry.status.is_terminal() {
            return Ok(());
        }

        let campaign = self
            .store
            .get_campaign(&entry.campaign_id)
            .await?
            .ok_or_else(|| DialerError::CampaignNotFound(entry.campaign_id.clone()))?;

        match retry::plan(&campaign, &entry, status, Some(details.clone())) {
            retry::RetryDecision::Retry { patch } => {
                self.store.update_queue_entry(entry.id, patch).await?;
            }
            retry::RetryDecision::Finalize { patch, call_patch } => {
                self.store.update_queue_entry(entry.id, patch).await?;
                self.store.update_call_by_sid(call_sid, call_patch).await?;
            }
        }
        Ok(())
    }
}

/// Wires `Scheduler::on_call_completed` into the Reconciler's synchronous
/// callback by spawning the async work — the reconciler's contract is
/// fire-and-forget for this sink (§4.6).
impl<S: CallStore + CampaignStore + 'static> CallCompletionSink for Scheduler<S> {
    fn on_call_completed(&self, call_sid: &str, status: CallStatus, details: &Value) {
        let scheduler = self.clone();
        let call_sid = call_sid.to_string();
        let details = details.clone();
        tokio::spawn(async move {
            if let Err(err) = scheduler.on_call_completed(&call_sid, status, &details).await {
                tracing::warn!(error = %err, "on_call_completed failed");
            }
        });
    }
}
