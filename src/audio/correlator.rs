//! STT Correlator (C3): routes provider webhook results to the originating
//! session by `call_id`, deduplicating by `request_id` so a redelivered
//! webhook cannot produce two assistant turns.

use std::collections::VecDeque;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::session::{SessionCommand, SessionHandle};

const DEDUPE_CAP: usize = 500;

/// One provider callback: `{request_id, call_id, text, language, is_final}`.
#[derive(Debug, Clone)]
pub struct SttCallback {
    pub request_id: String,
    pub call_id: String,
    pub text: String,
    pub language: String,
    pub is_final: bool,
}

/// Registry of active sessions keyed by `call_id`, plus a bounded
/// deduplication set per call.
#[derive(Default)]
pub struct SttCorrelator {
    sessions: DashMap<String, SessionHandle>,
    seen_request_ids: DashMap<String, Mutex<VecDeque<String>>>,
}

impl SttCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        self.sessions.insert(handle.call_sid.clone(), handle);
    }

    pub fn unregister(&self, call_sid: &str) {
        self.sessions.remove(call_sid);
        self.seen_request_ids.remove(call_sid);
    }

    /// Deliver a provider callback. Returns `true` if it was routed to an
    /// active session, `false` if dropped (no session, or a duplicate
    /// `request_id`).
    pub fn handle_callback(&self, callback: SttCallback) -> bool {
        let Some(session) = self.sessions.get(&callback.call_id) else {
            tracing::debug!(call_id = %callback.call_id, "stt callback for unknown session, dropping");
            return false;
        };

        let seen = self.seen_request_ids.entry(callback.call_id.clone()).or_default();
        {
            let mut seen = seen.lock();
            if seen.contains(&callback.request_id) {
                tracing::debug!(request_id = %callback.request_id, "duplicate stt callback, dropping");
                return false;
            }
            seen.push_back(callback.request_id.clone());
            while seen.len() > DEDUPE_CAP {
                seen.pop_front();
            }
        }

        session.send(SessionCommand::SttResult { text: callback.text, is_final: callback.is_final });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telephony::{MediaFrame, MediaTransport};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NullTransport;
    #[async_trait]
    impl MediaTransport for NullTransport {
        async fn send(&self, _frame: MediaFrame) -> crate::error::Result<()> {
            Ok(())
        }
        fn is_open(&self) -> bool {
            true
        }
        async fn close(&self) {}
    }

    fn make_callback(request_id: &str, call_id: &str) -> SttCallback {
        SttCallback {
            request_id: request_id.to_string(),
            call_id: call_id.to_string(),
            text: "hello".to_string(),
            language: "en".to_string(),
            is_final: true,
        }
    }

    #[tokio::test]
    async fn unknown_call_id_is_dropped() {
        let correlator = SttCorrelator::new();
        assert!(!correlator.handle_callback(make_callback("r1", "CA1")));
    }

    #[tokio::test]
    async fn duplicate_request_id_is_delivered_once() {
        let correlator = SttCorrelator::new();
        let (handle, _join) = crate::audio::AudioBridgeSession::spawn(
            "CA1",
            "agent-1",
            Arc::new(NullTransport),
            None,
            None,
            None,
        );
        correlator.register(handle);

        assert!(correlator.handle_callback(make_callback("r1", "CA1")));
        assert!(!correlator.handle_callback(make_callback("r1", "CA1")));
    }
}
