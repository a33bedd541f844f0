//! Campaign definition. Immutable during a run for the fields the core
//! reads; the Scheduler only ever reads a `Campaign`, never writes one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub status: CampaignStatus,
    pub caller_id: String,
    pub phone_number_id: Option<String>,
    pub max_concurrent_calls: u32,
    pub retry_delay_minutes: u32,
    pub retry_exponential_factor: f64,
    pub webhook_url: Option<String>,
    pub call_hours_start: Option<u32>,
    pub call_hours_end: Option<u32>,
}

impl Campaign {
    pub fn new(id: impl Into<String>, caller_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: CampaignStatus::Active,
            caller_id: caller_id.into(),
            phone_number_id: None,
            max_concurrent_calls: 5,
            retry_delay_minutes: 60,
            retry_exponential_factor: 1.5,
            webhook_url: None,
            call_hours_start: None,
            call_hours_end: None,
        }
    }

    /// Whether `hour` (0-23, caller's local convention) falls within the
    /// campaign's configured call-hours window. Campaigns without a window
    /// are never gated.
    pub fn within_call_hours(&self, hour: u32) -> bool {
        match (self.call_hours_start, self.call_hours_end) {
            (Some(start), Some(end)) if start <= end => hour >= start && hour < end,
            (Some(start), Some(end)) => hour >= start || hour < end, // overnight window
            _ => true,
        }
    }
}
