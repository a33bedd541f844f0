//! Audio Bridge (C2+C3): per-call media pump that transcodes telephony
//! audio, batches it to a speech-to-text provider with adaptive thresholds,
//! correlates transcription callbacks back to the originating session, and
//! streams synthesized replies back to the telephony leg.
//!
//! Grounded on the teacher's per-dialog actor pattern (an owned struct moved
//! into its own task, not a `Mutex<Session>`): all mutation of a session
//! happens on the task that owns it, so the borrow checker — not a runtime
//! lock — enforces the single-writer invariant from §5.

pub mod correlator;
pub mod session;

pub use correlator::SttCorrelator;
pub use session::{AudioBridgeSession, SessionCommand, SessionHandle};
