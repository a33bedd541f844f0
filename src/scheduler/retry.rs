//! Retry Planner (C8): decides whether a terminal disposition is retryable
//! and computes the next-attempt time.

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::model::call_row::CallStatus;
use crate::model::campaign::Campaign;
use crate::model::queue_entry::QueueEntry;
use crate::store::{CallRowPatch, QueueEntryPatch};

/// The outcome of a retry decision: either reschedule, or finalize.
pub enum RetryDecision {
    Retry { patch: QueueEntryPatch },
    Finalize { patch: QueueEntryPatch, call_patch: CallRowPatch },
}

/// `should_retry` (§4.8): `attempts` here is the already-incremented value
/// recorded by the dispatch attempt (see the Open Question decision in
/// SPEC_FULL.md §9 — `process_queue` increments once, before the RPC).
pub fn should_retry(status: CallStatus, entry: &QueueEntry) -> bool {
    if entry.attempts >= entry.max_attempts {
        return false;
    }
    if status == CallStatus::Completed {
        return false;
    }
    if status == CallStatus::Machine && !entry.retry_on_machine {
        return false;
    }
    matches!(status, CallStatus::Busy | CallStatus::NoAnswer | CallStatus::Failed | CallStatus::Machine)
}

/// `schedule_retry` (§4.8). `entry.attempts` must already reflect this
/// attempt (post-increment) before calling this function.
pub fn plan(campaign: &Campaign, entry: &QueueEntry, status: CallStatus, result_details: Option<serde_json::Value>) -> RetryDecision {
    let now = Utc::now();

    if should_retry(status, entry) {
        let retry_delay_ms = next_retry_delay_ms(campaign, entry.attempts);
        let next_scheduled_time = now + ChronoDuration::milliseconds(retry_delay_ms);

        let patch = QueueEntryPatch {
            status: Some(crate::model::queue_entry::QueueEntryStatus::Retry),
            scheduled_time: Some(next_scheduled_time),
            last_attempt_status: Some(Some(status.as_str().to_string())),
            last_attempt_time: Some(Some(now)),
            result_details: Some(result_details),
            ..Default::default()
        };
        RetryDecision::Retry { patch }
    } else {
        let terminal_status = if status == CallStatus::Completed {
            crate::model::queue_entry::QueueEntryStatus::Completed
        } else {
            crate::model::queue_entry::QueueEntryStatus::Failed
        };

        let call_patch = CallRowPatch {
            status: Some(status),
            end_time: Some(Some(now)),
            duration: detail_i64(&result_details, "duration"),
            recording_url: detail_string(&result_details, "recording_url").map(Some),
            amd_result: detail_string(&result_details, "amd_result").map(Some),
            amd_duration: detail_i64(&result_details, "amd_duration").map(Some),
            ..Default::default()
        };

        let patch = QueueEntryPatch {
            status: Some(terminal_status),
            end_time: Some(Some(now)),
            result: Some(Some(status.as_str().to_string())),
            result_details: Some(result_details),
            last_attempt_status: Some(Some(status.as_str().to_string())),
            last_attempt_time: Some(Some(now)),
            ..Default::default()
        };
        RetryDecision::Finalize { patch, call_patch }
    }
}

fn next_retry_delay_ms(campaign: &Campaign, attempts_after_increment: u32) -> i64 {
    let base_ms = campaign.retry_delay_minutes as f64 * 60_000.0;
    let factor = campaign.retry_exponential_factor.powi(attempts_after_increment as i32);
    (base_ms * factor) as i64
}

/// Pulls a top-level integer field out of the opaque completion-event
/// `details` blob (§4.8's `on_call_completed` carries no typed
/// duration/machine-detection fields of its own, only this JSON payload).
fn detail_i64(details: &Option<serde_json::Value>, key: &str) -> Option<i64> {
    details.as_ref()?.get(key)?.as_i64()
}

fn detail_string(details: &Option<serde_json::Value>, key: &str) -> Option<String> {
    details.as_ref()?.get(key)?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_entry(attempts: u32, max_attempts: u32) -> QueueEntry {
        let mut entry = QueueEntry::new("camp-1", "c1", "+1", "+1", None, 0, Utc::now(), max_attempts, true, serde_json::json!({}));
        entry.attempts = attempts;
        entry
    }

    #[test]
    fn retries_busy_under_max_attempts() {
        let entry = make_entry(1, 3);
        assert!(should_retry(CallStatus::Busy, &entry));
    }

    #[test]
    fn does_not_retry_at_max_attempts() {
        let entry = make_entry(3, 3);
        assert!(!should_retry(CallStatus::Busy, &entry));
    }

    #[test]
    fn does_not_retry_completed() {
        let entry = make_entry(1, 3);
        assert!(!should_retry(CallStatus::Completed, &entry));
    }

    #[test]
    fn does_not_retry_machine_unless_opted_in() {
        let mut entry = make_entry(1, 3);
        assert!(!should_retry(CallStatus::Machine, &entry));
        entry.retry_on_machine = true;
        assert!(should_retry(CallStatus::Machine, &entry));
    }

    /// §4.8's Finalize branch must surface duration/recording_url/machine
    /// detection onto the CallRow patch, pulled out of the opaque `details`
    /// blob — not just status/end_time.
    #[test]
    fn finalize_populates_call_patch_from_details() {
        let campaign = Campaign::new("camp-1", "+1");
        let entry = make_entry(3, 3);
        let details = serde_json::json!({
            "duration": 42,
            "recording_url": "https://recordings.example/call-1.wav",
            "amd_result": "human",
            "amd_duration": 1500,
        });

        match plan(&campaign, &entry, CallStatus::Completed, Some(details)) {
            RetryDecision::Finalize { call_patch, .. } => {
                assert_eq!(call_patch.duration, Some(42));
                assert_eq!(call_patch.recording_url, Some(Some("https://recordings.example/call-1.wav".to_string())));
                assert_eq!(call_patch.amd_result, Some(Some("human".to_string())));
                assert_eq!(call_patch.amd_duration, Some(Some(1500)));
            }
            RetryDecision::Retry { .. } => panic!("expected Finalize"),
        }
    }

    #[test]
    fn finalize_leaves_call_patch_fields_unset_without_details() {
        let campaign = Campaign::new("camp-1", "+1");
        let entry = make_entry(3, 3);

        match plan(&campaign, &entry, CallStatus::Failed, None) {
            RetryDecision::Finalize { call_patch, .. } => {
                assert_eq!(call_patch.duration, None);
                assert_eq!(call_patch.recording_url, None);
                assert_eq!(call_patch.amd_result, None);
                assert_eq!(call_patch.amd_duration, None);
            }
            RetryDecision::Retry { .. } => panic!("expected Finalize"),
        }
    }

    /// Scenario 2 (§8): retry_delay_minutes=1, retry_exponential_factor=2 ⇒
    /// first retry ≈ 60_000 * 2^1 = 120_000ms, second ≈ 60_000 * 2^2 = 240_000ms.
    #[test]
    fn retry_delay_matches_scenario_2() {
        let mut campaign = Campaign::new("camp-1", "+1");
        campaign.retry_delay_minutes = 1;
        campaign.retry_exponential_factor = 2.0;

        let first = next_retry_delay_ms(&campaign, 1);
        assert_eq!(first, 120_000);

        let second = next_retry_delay_ms(&campaign, 2);
        assert_eq!(second, 240_000);
    }
}
