//! Bridge registry: the process-wide `call_sid` → session directory.
//!
//! Grounded on the teacher's `CallCenterState::active_bridges` pattern — a
//! bare `DashMap` rather than a module-level singleton, so the registry is
//! owned by whichever part of the binary wires the subsystems together and
//! can be constructed fresh per test.

use dashmap::DashMap;

use crate::audio::{SessionCommand, SessionHandle};

#[derive(Default)]
pub struct BridgeRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: SessionHandle) {
        self.sessions.insert(handle.call_sid.clone(), handle);
    }

    pub fn unregister(&self, call_sid: &str) -> Option<SessionHandle> {
        self.sessions.remove(call_sid).map(|(_, handle)| handle)
    }

    pub fn get(&self, call_sid: &str) -> Option<SessionHandle> {
        self.sessions.get(call_sid).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sends `Close` to the session for `call_sid`, if present, and drops it
    /// from the registry. Called when the Event Router or Reconciler learns
    /// a call leg has ended.
    pub fn close(&self, call_sid: &str) {
        if let Some(handle) = self.unregister(call_sid) {
            handle.send(SessionCommand::Close);
        }
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

    #[tokio::test]
    async fn register_then_close_removes_entry() {
        let registry = BridgeRegistry::new();
        let (handle, _join) = crate::audio::AudioBridgeSession::spawn("CA1", "agent-1", Arc::new(NullTransport), None, None, None);
        registry.register(handle);
        assert_eq!(registry.len(), 1);

        registry.close("CA1");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn get_returns_clone_of_handle() {
        let registry = BridgeRegistry::new();
        let (handle, _join) = crate::audio::AudioBridgeSession::spawn("CA2", "agent-1", Arc::new(NullTransport), None, None, None);
        registry.register(handle);

        let found = registry.get("CA2");
        assert!(found.is_some());
        assert_eq!(found.unwrap().call_sid, "CA2");
    }
}
