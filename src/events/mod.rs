//! Event Router (C5): in-process publish/subscribe fabric. Topic-based, not
//! typed-event-based — the set of topics is open, so this is modeled as a
//! registry mapping string keys to handler lists rather than with
//! inheritance or a closed enum of event types, per Design Notes.
//!
//! Grounded on the active-registries pattern the call engine uses for
//! `active_bridges`/`active_listeners`: an `Arc<DashMap<...>>` constructed
//! once and threaded through, never a module-level singleton.

pub mod webhook;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

pub use webhook::WebhookSink;

/// A lifecycle event flowing through the router. `campaign_id`, when set,
/// additionally routes to the campaign-scoped topic.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: String,
    pub call_sid: String,
    pub campaign_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, call_sid: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            call_sid: call_sid.into(),
            campaign_id: None,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    /// The domain-level topic this event belongs to, e.g. `call.started`.
    pub fn base_topic(&self) -> Topic {
        Topic::parse(&self.event_type).unwrap_or_else(|| Topic {
            domain: "call".to_string(),
            event: self.event_type.clone(),
            campaign_id: None,
        })
    }
}

/// Hierarchical dot-separated topic: `<domain>.<event>[.campaign.<id>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub domain: String,
    pub event: String,
    pub campaign_id: Option<String>,
}

impl Topic {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('.');
        let domain = parts.next()?.to_string();
        let event = parts.next()?.to_string();
        let campaign_id = match (parts.next(), parts.next()) {
            (Some("campaign"), Some(id)) => Some(id.to_string()),
            _ => None,
        };
        Some(Self { domain, event, campaign_id })
    }

    pub fn key(&self) -> String {
        match &self.campaign_id {
            Some(id) => format!("{}.{}.campaign.{}", self.domain, self.event, id),
            None => format!("{}.{}", self.domain, self.event),
        }
    }

    pub fn unfiltered_key(domain: &str, event: &str) -> String {
        format!("{domain}.{event}")
    }

    pub fn campaign_key(domain: &str, event: &str, campaign_id: &str) -> String {
        format!("{domain}.{event}.campaign.{campaign_id}")
    }
}

/// A registered handler. Stored behind `Arc` so `unsubscribe` can remove a
/// single entry by id without cloning the closure.
pub struct Subscription {
    pub id: u64,
    pub topic_key: String,
    pub created_at: DateTime<Utc>,
    handler: Arc<dyn Fn(&Event) + Send + Sync>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic_key", &self.topic_key)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// In-process event bus. `publish` delivers synchronously, within the
/// publisher's execution context, to every handler subscribed to the
/// unfiltered topic and (if the event carries a campaign id) the
/// campaign-scoped topic. A handler panic is caught so it cannot prevent
/// other handlers from running.
#[derive(Default)]
pub struct Bus {
    subscriptions: DashMap<String, Vec<Subscription>>,
    next_id: AtomicU64,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic. If `campaign_id` is set, the effective topic
    /// gets the `campaign.<id>` suffix instead of the bare topic.
    pub fn subscribe(
        &self,
        domain: &str,
        event: &str,
        campaign_id: Option<&str>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> u64 {
        let topic_key = match campaign_id {
            Some(id) => Topic::campaign_key(domain, event, id),
            None => Topic::unfiltered_key(domain, event),
        };
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription {
            id,
            topic_key: topic_key.clone(),
            created_at: Utc::now(),
            handler: Arc::new(handler),
        };
        self.subscriptions.entry(topic_key).or_default().push(subscription);
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        for mut entry in self.subscriptions.iter_mut() {
            entry.value_mut().retain(|s| s.id != id);
        }
    }

    /// Deliver `event` to every matching handler, in registration order.
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &Event) -> usize {
        let topic = event.base_topic();
        let mut delivered = 0;

        delivered += self.dispatch(&Topic::unfiltered_key(&topic.domain, &topic.event), event);

        if let Some(campaign_id) = &event.campaign_id {
            delivered += self.dispatch(&Topic::campaign_key(&topic.domain, &topic.event, campaign_id), event);
        }

        delivered
    }

    fn dispatch(&self, topic_key: &str, event: &Event) -> usize {
        let Some(handlers) = self.subscriptions.get(topic_key) else {
            return 0;
        };
        let mut delivered = 0;
        for subscription in handlers.iter() {
            let handler = subscription.handler.clone();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(event)));
            if let Err(_) = outcome {
                tracing::error!(topic = %topic_key, "event handler panicked");
            } else {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn topic_round_trips_through_key() {
        let topic = Topic { domain: "call".into(), event: "started".into(), campaign_id: Some("c1".into()) };
        assert_eq!(Topic::parse(&topic.key()), Some(topic));
    }

    #[test]
    fn subscriber_receives_unfiltered_and_campaign_scoped_events() {
        let bus = Bus::new();
        let unfiltered_count = Arc::new(AtomicUsize::new(0));
        let campaign_count = Arc::new(AtomicUsize::new(0));

        {
            let counter = unfiltered_count.clone();
            bus.subscribe("call", "started", None, move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        {
            let counter = campaign_count.clone();
            bus.subscribe("call", "started", Some("camp-1"), move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        let event = Event::new("call.started", "CA1", serde_json::json!({})).with_campaign("camp-1");
        let delivered = bus.publish(&event);

        assert_eq!(delivered, 2);
        assert_eq!(unfiltered_count.load(Ordering::Relaxed), 1);
        assert_eq!(campaign_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn events_for_one_call_sid_are_delivered_in_publish_order() {
        let bus = Bus::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            bus.subscribe("call", "started", None, move |e| seen.lock().push(e.event_type.clone()));
        }

        for event_type in ["call.started", "call.started", "call.started"] {
            bus.publish(&Event::new(event_type, "CA1", serde_json::json!({})));
        }

        assert_eq!(*seen.lock(), vec!["call.started", "call.started", "call.started"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = Bus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let id = {
            let count = count.clone();
            bus.subscribe("call", "ended", None, move |_| {
                count.fetch_add(1, Ordering::Relaxed);
            })
        };
        bus.unsubscribe(id);
        bus.publish(&Event::new("call.ended", "CA1", serde_json::json!({})));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
