//! Reconciler (C6): merges external telephony lifecycle events with
//! persisted call state before re-publishing them through the Event Router.
//!
//! Store failures here are logged and dropped rather than propagated — per
//! the error handling design, the lifecycle webhook source is expected to
//! redeliver on its own channel, if any, so retrying inline would just
//! duplicate reconciliation work.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::events::{Bus, Event};
use crate::model::call_row::{CallDirection, CallRecording, CallRow, CallStatus};
use crate::store::{CallRecordingPatch, CallRowPatch, CallStore};

/// One telephony lifecycle notification, as delivered by the provider.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub event_type: LifecycleEventType,
    pub call_sid: String,
    pub campaign_id: Option<String>,
    pub direction: CallDirection,
    pub from: String,
    pub to: String,
    pub status: Option<CallStatus>,
    pub duration: Option<i64>,
    pub recording_sid: Option<String>,
    pub recording_url: Option<String>,
    pub details: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventType {
    CallStarted,
    CallAnswered,
    CallEnded,
    RecordingStarted,
    RecordingEnded,
}

impl LifecycleEventType {
    fn as_str(self) -> &'static str {
        match self {
            LifecycleEventType::CallStarted => "call.started",
            LifecycleEventType::CallAnswered => "call.answered",
            LifecycleEventType::CallEnded => "call.ended",
            LifecycleEventType::RecordingStarted => "recording.started",
            LifecycleEventType::RecordingEnded => "recording.ended",
        }
    }
}

/// Callback invoked after a `call.ended` event for a queue-entry-bound call,
/// wired to `Scheduler::on_call_completed` by the caller.
pub trait CallCompletionSink: Send + Sync {
    fn on_call_completed(&self, call_sid: &str, status: CallStatus, details: &Value);
}

pub struct Reconciler<S: CallStore> {
    store: Arc<S>,
    bus: Arc<Bus>,
}

impl<S: CallStore> Reconciler<S> {
    pub fn new(store: Arc<S>, bus: Arc<Bus>) -> Self {
        Self { store, bus }
    }

    /// Process one lifecycle event per §4.6, then re-publish it (unfiltered
    /// and campaign-scoped if applicable).
    pub async fn reconcile(&self, event: LifecycleEvent, completion_sink: Option<&dyn CallCompletionSink>) {
        let now = Utc::now();

        match event.event_type {
            LifecycleEventType::CallStarted => {
                self.handle_call_started(&event, now).await;
            }
            LifecycleEventType::CallAnswered => {
                self.handle_call_answered(&event, now).await;
            }
            LifecycleEventType::CallEnded => {
                self.handle_call_ended(&event, now, completion_sink).await;
            }
            LifecycleEventType::RecordingStarted => {
                self.handle_recording_started(&event, now).await;
            }
            LifecycleEventType::RecordingEnded => {
                self.handle_recording_ended(&event, now).await;
            }
        }

        self.republish(&event);
    }

    async fn handle_call_started(&self, event: &LifecycleEvent, now: chrono::DateTime<Utc>) {
        match self.store.find_call_by_sid(&event.call_sid).await {
            Ok(Some(_)) => {
                let patch = CallRowPatch {
                    status: Some(CallStatus::InProgress),
                    append_event: Some(("call.started".into(), now)),
                    ..Default::default()
                };
                self.log_store_err(self.store.update_call_by_sid(&event.call_sid, patch).await);
            }
            Ok(None) => {
                let mut row = CallRow::new(event.call_sid.clone(), event.direction, event.from.clone(), event.to.clone());
                row.campaign_id = event.campaign_id.clone();
                row.status = CallStatus::InProgress;
                row.start_time = now;
                row.append_event("call.started", now);
                self.log_store_err(self.store.create_call(row).await);
            }
            Err(err) => tracing::warn!(error = %err, call_sid = %event.call_sid, "store lookup failed during reconcile"),
        }
    }

    async fn handle_call_answered(&self, event: &LifecycleEvent, now: chrono::DateTime<Utc>) {
        let patch = CallRowPatch {
            status: Some(CallStatus::Answered),
            answer_time: Some(Some(now)),
            append_event: Some(("call.answered".into(), now)),
            ..Default::default()
        };
        self.log_store_err(self.store.update_call_by_sid(&event.call_sid, patch).await);
    }

    async fn handle_call_ended(
        &self,
        event: &LifecycleEvent,
        now: chrono::DateTime<Utc>,
        completion_sink: Option<&dyn CallCompletionSink>,
    ) {
        let status = event.status.unwrap_or(CallStatus::Completed);
        let patch = CallRowPatch {
            status: Some(status),
            end_time: Some(Some(now)),
            duration: Some(event.duration.unwrap_or(0)),
            append_event: Some(("call.ended".into(), now)),
            ..Default::default()
        };
        self.log_store_err(self.store.update_call_by_sid(&event.call_sid, patch).await);

        if event.campaign_id.is_some() {
            if let Some(sink) = completion_sink {
                sink.on_call_completed(&event.call_sid, status, &event.details);
            }
        }
    }

    async fn handle_recording_started(&self, event: &LifecycleEvent, now: chrono::DateTime<Utc>) {
        self.log_store_err(
            self.store
                .update_call_by_sid(
                    &event.call_sid,
                    CallRowPatch { append_event: Some(("recording.started".into(), now)), ..Default::default() },
                )
                .await,
        );

        if let Some(recording_sid) = &event.recording_sid {
            let recording = CallRecording::new(recording_sid.clone(), event.call_sid.clone());
            self.log_store_err(self.store.create_recording(recording).await);
        }
    }

    async fn handle_recording_ended(&self, event: &LifecycleEvent, now: chrono::DateTime<Utc>) {
        self.log_store_err(
            self.store
                .update_call_by_sid(
                    &event.call_sid,
                    CallRowPatch {
                        recording_url: Some(event.recording_url.clone()),
                        append_event: Some(("recording.ended".into(), now)),
                        ..Default::default()
                    },
                )
                .await,
        );

        if let Some(recording_sid) = &event.recording_sid {
            let patch = CallRecordingPatch {
                status: Some(crate::model::call_row::RecordingStatus::Completed),
                end_time: Some(Some(now)),
                duration: Some(event.duration.unwrap_or(0)),
                url: Some(event.recording_url.clone()),
            };
            self.log_store_err(self.store.update_recording(recording_sid, patch).await);
        }
    }

    fn republish(&self, event: &LifecycleEvent) {
        let mut router_event = Event::new(event.event_type.as_str(), event.call_sid.clone(), event.details.clone());
        if let Some(campaign_id) = &event.campaign_id {
            router_event = router_event.with_campaign(campaign_id.clone());
        }
        self.bus.publish(&router_event);
    }

    fn log_store_err<T>(&self, result: crate::error::Result<T>) {
        if let Err(err) = result {
            tracing::warn!(error = %err, "store operation failed during reconcile, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCallStore;

    fn make_event(event_type: LifecycleEventType, call_sid: &str) -> LifecycleEvent {
        LifecycleEvent {
            event_type,
            call_sid: call_sid.to_string(),
            campaign_id: Some("camp-1".to_string()),
            direction: CallDirection::Outbound,
            from: "+15550000000".to_string(),
            to: "+15551111111".to_string(),
            status: None,
            duration: None,
            recording_sid: None,
            recording_url: None,
            details: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn call_started_creates_row_when_absent() {
        let store = Arc::new(InMemoryCallStore::new());
        let bus = Arc::new(Bus::new());
        let reconciler = Reconciler::new(store.clone(), bus);

        reconciler.reconcile(make_event(LifecycleEventType::CallStarted, "CA1"), None).await;

        let row = store.find_call_by_sid("CA1").await.unwrap().unwrap();
        assert_eq!(row.status, CallStatus::InProgress);
        assert_eq!(row.metadata["events"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn call_ended_invokes_completion_sink_when_campaign_scoped() {
        struct Recorder(parking_lot::Mutex<Vec<String>>);
        impl CallCompletionSink for Recorder {
            fn on_call_completed(&self, call_sid: &str, _status: CallStatus, _details: &Value) {
                self.0.lock().push(call_sid.to_string());
            }
        }

        let store = Arc::new(InMemoryCallStore::new());
        let bus = Arc::new(Bus::new());
        let reconciler = Reconciler::new(store.clone(), bus);
        reconciler.reconcile(make_event(LifecycleEventType::CallStarted, "CA1"), None).await;

        let recorder = Recorder(parking_lot::Mutex::new(Vec::new()));
        reconciler.reconcile(make_event(LifecycleEventType::CallEnded, "CA1"), Some(&recorder)).await;

        assert_eq!(recorder.0.lock().as_slice(), ["CA1"]);
        let row = store.find_call_by_sid("CA1").await.unwrap().unwrap();
        assert_eq!(row.status, CallStatus::Completed);
        assert!(row.end_time.is_some());
    }
}
