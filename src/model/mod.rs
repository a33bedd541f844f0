//! Data model shared by the scheduler, event router, and call store.
//!
//! `metadata` fields are kept as opaque [`serde_json::Value`] blobs rather
//! than strongly typed structs — only `events[]` within a `CallRow`'s
//! metadata is structurally accessed by the core, per Design Notes.

pub mod campaign;
pub mod contact;
pub mod queue_entry;
pub mod call_row;

pub use campaign::{Campaign, CampaignStatus};
pub use contact::Contact;
pub use queue_entry::{QueueEntry, QueueEntryId, QueueEntryStatus};
pub use call_row::{CallDirection, CallRecording, CallRow, CallStatus, RecordingStatus};
