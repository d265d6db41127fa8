//! `hnsync`: mirror Hacker News into a SQLite database.
//!
//! # Usage
//!
//! ```text
//! hnsync hn.db                 catch up, then follow live updates
//! hnsync hn.db 8863            fetch one item
//! hnsync hn.db 8863,121003     fetch a list of items
//! hnsync hn.db 200000 100000   fetch a range, newest first
//! hnsync hn.db --missing       fill holes below the newest stored item
//! hnsync hn.db --users         fetch profiles of stored authors
//! ```

mod args;
mod settings;
mod shutdown;

use std::sync::Arc;

use anyhow::Context as _;
use args::{Args, Mode};
use clap::Parser;
use settings::Settings;
use hnsync_client::{HnClient, UpdateStream};
use hnsync_core::sink::{ConflictPolicy, WritePolicy};
use hnsync_pipeline::{BackfillReport, SyncOrchestrator};
use hnsync_store_sqlite::SqliteSink;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let mode = args.mode().unwrap_or_else(|e| e.exit());
  let settings = Settings::load(args.config.as_deref())?;

  let sink = SqliteSink::open(&args.db)
    .await
    .with_context(|| format!("failed to open database at {:?}", args.db))?;
  let client = HnClient::new(settings.client()).context("failed to build HTTP client")?;
  let shutdown = shutdown::install();

  let orchestrator =
    SyncOrchestrator::new(Arc::new(client.clone()), Arc::new(sink), settings.pipeline());
  let policy = if args.insert_only {
    WritePolicy::insert_only()
  } else {
    WritePolicy { conflict: ConflictPolicy::Replace, kids: settings.kids }
  };

  let report = match mode {
    Mode::Sync => {
      let stream = UpdateStream::new(&client, settings.feed())
        .context("failed to set up the update stream")?;
      let outcome = orchestrator.run(stream.start(), shutdown).await.context("sync failed")?;
      tracing::info!(
        drained = outcome.drained,
        resolved = outcome.resolved,
        interrupted = outcome.interrupted,
        "sync stopped"
      );
      outcome.backfill
    }
    Mode::Items(selection) => orchestrator
      .backfill(&selection, policy, &shutdown)
      .await
      .context("backfill failed")?,
    Mode::Gaps => orchestrator
      .fill_gaps(policy, &shutdown)
      .await
      .context("gap fill failed")?,
    Mode::Authors => orchestrator
      .fill_authors(policy, &shutdown)
      .await
      .context("author fill failed")?,
  };

  let BackfillReport { requested, written, interrupted } = report;
  tracing::info!(requested, written, interrupted, "done");
  Ok(())
}
