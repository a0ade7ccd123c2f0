//! Conversation state persistence for stateful conversational agents.
//!
//! Keeps an in-memory conversation consistent with its durable unit, and
//! reads the whole corpus back for auditing.
//!
//! # Main types
//!
//! - [`ConversationRecord`] — Transcript, current assessment and timestamps for one key.
//! - [`RecordCodec`] — The durable JSON representation.
//! - [`ConversationStateStore`] — Trait for load-or-create / save / exists / scan.
//! - [`FileConversationStore`] — One JSON file per key, crash-safe writes.
//! - [`AssessmentMerger`] — Latest-wins assessment updates.
//! - [`ReportingAggregator`] — Listings and statistics over the corpus.
//! - [`SessionBridge`] — Hooks called by the agent runtime at start and after each turn.

/// Agent runtime hooks.
pub mod bridge;
/// Durable encoding.
pub mod codec;
/// Store configuration.
pub mod config;
/// Assessment merge policy.
pub mod merger;
/// The persisted entity.
pub mod record;
/// Corpus reporting.
pub mod reporting;
/// Store trait and file-backed implementation.
pub mod store;

pub use bridge::SessionBridge;
pub use codec::RecordCodec;
pub use config::{CorruptionPolicy, StoreConfig};
pub use merger::AssessmentMerger;
pub use record::ConversationRecord;
pub use reporting::{RecordSummary, ReportingAggregator, SessionListing, Stats};
pub use store::{Anomaly, ConversationStateStore, CorpusScan, FileConversationStore, LoadOutcome};
