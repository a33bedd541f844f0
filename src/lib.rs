//! Outbound voice-campaign engine.
//!
//! This crate implements the three coupled subsystems that make automated
//! outbound calling work: a [`scheduler`] that paces call placement under
//! per-campaign concurrency caps and retries failed attempts with backoff,
//! an [`events`] router that fans out call lifecycle events to subscribers
//! and signed webhooks, and an [`audio`] bridge that pumps telephony media
//! through a speech-to-text/text-to-speech round trip.
//!
//! The HTTP/CRUD surface for campaigns and contacts, the web UI, and the
//! telephony/speech provider implementations themselves are out of scope —
//! they are collaborators reached through the traits in [`telephony`].
//!
//! # Quick start
//!
//! ```no_run
//! use campaign_dialer::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = DialerConfig::from_env();
//! let store = store::SqliteCallStore::connect(":memory:").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod config;
pub mod model;
pub mod codec;
pub mod store;
pub mod events;
pub mod reconcile;
pub mod scheduler;
pub mod audio;
pub mod telephony;
pub mod ratelimit;
pub mod registry;

pub mod prelude {
    //! Convenience re-exports for downstream binaries and tests.
    pub use crate::error::{DialerError, Result};
    pub use crate::config::DialerConfig;
    pub use crate::model::*;
    pub use crate::store::{self, CallStore, CampaignStore};
    pub use crate::events::{Bus, Event, Subscription, Topic};
    pub use crate::scheduler::{Scheduler, ScheduleBatchOptions, ScheduleBatchResult, ProcessQueueResult};
    pub use crate::reconcile::Reconciler;
    pub use crate::audio::{AudioBridgeSession, SttCorrelator};
    pub use crate::registry::BridgeRegistry;
}
