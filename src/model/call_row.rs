//! Durable record of a single placed call, and its recordings.
//! `call_sid` uniquely identifies a call across all components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    InProgress,
    Answered,
    Completed,
    Busy,
    NoAnswer,
    Failed,
    Machine,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Initiated => "initiated",
            CallStatus::InProgress => "in-progress",
            CallStatus::Answered => "answered",
            CallStatus::Completed => "completed",
            CallStatus::Busy => "busy",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Failed => "failed",
            CallStatus::Machine => "machine",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "initiated" => CallStatus::Initiated,
            "in-progress" => CallStatus::InProgress,
            "answered" => CallStatus::Answered,
            "completed" => CallStatus::Completed,
            "busy" => CallStatus::Busy,
            "no-answer" => CallStatus::NoAnswer,
            "failed" => CallStatus::Failed,
            "machine" => CallStatus::Machine,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRow {
    pub call_sid: String,
    pub campaign_id: Option<String>,
    pub contact_id: Option<String>,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub from: String,
    pub to: String,
    pub start_time: DateTime<Utc>,
    pub answer_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: i64,
    pub recording_url: Option<String>,
    pub recording_sid: Option<String>,
    pub amd_result: Option<String>,
    pub amd_duration: Option<i64>,
    /// Opaque blob; only `events[]` within it is structurally accessed.
    pub metadata: Value,
}

impl CallRow {
    pub fn new(
        call_sid: impl Into<String>,
        direction: CallDirection,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            call_sid: call_sid.into(),
            campaign_id: None,
            contact_id: None,
            direction,
            status: CallStatus::Initiated,
            from: from.into(),
            to: to.into(),
            start_time: Utc::now(),
            answer_time: None,
            end_time: None,
            duration: 0,
            recording_url: None,
            recording_sid: None,
            amd_result: None,
            amd_duration: None,
            metadata: json!({ "events": [] }),
        }
    }

    /// Append-only `events[]` log within `metadata`.
    pub fn append_event(&mut self, event_type: &str, timestamp: DateTime<Utc>) {
        let entry = json!({ "type": event_type, "timestamp": timestamp });
        match self.metadata.get_mut("events").and_then(Value::as_array_mut) {
            Some(events) => events.push(entry),
            None => {
                self.metadata = json!({ "events": [entry] });
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecording {
    pub recording_sid: String,
    pub call_sid: String,
    pub status: RecordingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: i64,
    pub url: Option<String>,
}

impl CallRecording {
    pub fn new(recording_sid: impl Into<String>, call_sid: impl Into<String>) -> Self {
        Self {
            recording_sid: recording_sid.into(),
            call_sid: call_sid.into(),
            status: RecordingStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            duration: 0,
            url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_event_accumulates() {
        let mut row = CallRow::new("CA1", CallDirection::Outbound, "+15551234567", "+15557654321");
        row.append_event("call.started", Utc::now());
        row.append_event("call.answered", Utc::now());
        let events = row.metadata["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "call.started");
        assert_eq!(events[1]["type"], "call.answered");
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            CallStatus::Initiated,
            CallStatus::InProgress,
            CallStatus::Answered,
            CallStatus::Completed,
            CallStatus::Busy,
            CallStatus::NoAnswer,
            CallStatus::Failed,
            CallStatus::Machine,
        ] {
            assert_eq!(CallStatus::from_str(status.as_str()), Some(status));
        }
    }
}
