//! fmr-runtime
//!
//! Orchestration of one full run: optional janitor sweep, candidate
//! selection, the rate-governed forge fetch stage, and the diff+emit stage.
//! The janitor and the reconciler share the mirror handle and the governor
//! but never interleave.

use anyhow::Result;
use fmr_config::Config;
use fmr_db::Mirror;
use fmr_forge::ForgeClient;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

mod janitor;
mod reconcile;
mod select;

pub use janitor::{janitor_run, JanitorStats};
pub use reconcile::{reconcile_run, ReconcileStats, FETCH_WORKERS};
pub use select::select_candidates;

/// One full run, gated by the two skip flags. Fatal anywhere aborts the rest.
pub async fn run(cfg: &Config, mirror: &Mirror, forge: Arc<ForgeClient>) -> Result<()> {
    let started = Instant::now();

    if cfg.skip_janitor {
        info!("janitor sweep skipped");
    } else {
        janitor_run(cfg, mirror).await?;
    }

    if cfg.skip_reconcile {
        info!("reconcile stage skipped");
    } else {
        reconcile_run(cfg, mirror, forge).await?;
    }

    info!("time: {:?}", started.elapsed());
    Ok(())
}

/// Ten-second progress throttle for the long stages.
pub(crate) struct Progress {
    started: Instant,
    last: Instant,
    every: Duration,
}

impl Progress {
    pub(crate) fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: now,
            every: Duration::from_secs(10),
        }
    }

    /// `true` at most once per interval; the caller emits the log line.
    pub(crate) fn due(&mut self) -> bool {
        if self.last.elapsed() >= self.every {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_throttled() {
        let mut p = Progress::new();
        assert!(!p.due(), "nothing is due immediately");
        // Force the window open.
        p.last = Instant::now() - Duration::from_secs(11);
        assert!(p.due());
        assert!(!p.due(), "due() rearms the throttle");
    }
}
