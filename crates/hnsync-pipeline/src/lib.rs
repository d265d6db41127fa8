//! The fetch / batch / persist pipeline.
//!
//! [`BackfillDriver`] walks ID ranges or lists through a bounded
//! [`FetchPool`] into a serialized [`BatchWriter`]. [`LiveTailer`] follows the
//! update feed, staging notices in an [`UpdateBuffer`] until the backfill is
//! done. [`SyncOrchestrator`] sequences the two and owns shutdown.

pub mod backfill;
pub mod buffer;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod tailer;
pub mod writer;

pub use backfill::{BackfillDriver, BackfillReport};
pub use buffer::{Staged, UpdateBuffer};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use orchestrator::{SyncOrchestrator, SyncOutcome};
pub use pool::{FetchPool, Fetched};
pub use progress::Progress;
pub use retry::RetryConfig;
pub use tailer::{LiveTailer, TailerControl, TailerReport, UpdateResolver};
pub use writer::{BatchWriter, WriteStats};

#[cfg(test)]
mod testing;
