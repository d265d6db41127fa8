//! Ctrl+C handling: the first signal asks the run to stop after the work in
//! hand, the second exits immediately.

use tokio::sync::watch;

/// Exit status for a forced quit (128 + SIGINT).
const FORCE_QUIT_STATUS: i32 = 130;

pub fn install() -> watch::Receiver<bool> {
  let (tx, rx) = watch::channel(false);

  tokio::spawn(async move {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to install Ctrl+C handler");
      // Keep the sender alive; a dropped sender reads as a shutdown.
      std::future::pending::<()>().await;
    }

    tracing::warn!("shutdown requested, finishing current work; press Ctrl+C again to force quit");
    let _ = tx.send(true);

    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("force quit");
      std::process::exit(FORCE_QUIT_STATUS);
    }
  });

  rx
}
