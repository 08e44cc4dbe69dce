//! The artificial-event janitor.
//!
//! Reconciling at hh:08 can write a synthetic event whose state the next real
//! feed event (arriving within the hour) carries anyway. This sweep finds
//! such events in the recent window and deletes the ones both neighbours
//! prove redundant. Mirror-only: the sweep never touches the forge, so it
//! runs at full worker parallelism.

use crate::Progress;
use anyhow::{Context, Result};
use fmr_config::Config;
use fmr_db::{ArtificialRow, Mirror};
use fmr_reconcile::{judge_predecessor, judge_successor, successor_window_end, NeighbourState};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct JanitorStats {
    pub processed: usize,
    pub deleted: u64,
}

/// Sweep the recent window (or the explicit debug list) for redundant
/// synthetic events and delete them.
pub async fn janitor_run(cfg: &Config, mirror: &Mirror) -> Result<JanitorStats> {
    let threads = cfg.threads();
    info!("running artificial events cleanup on {threads} workers");

    let rows = if cfg.only_events.is_empty() {
        mirror.artificial_rows_recent(&cfg.recent_range).await?
    } else {
        info!(
            "processing only selected {} events for debugging: {:?}",
            cfg.only_events.len(),
            cfg.only_events
        );
        mirror.artificial_rows_by_ids(&cfg.only_events).await?
    };
    let total = rows.len();

    let deleted = Arc::new(Mutex::new(0u64));
    let sem = Arc::new(Semaphore::new(threads.max(1)));
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    for row in rows {
        let sem = sem.clone();
        let mirror = mirror.clone();
        let deleted = deleted.clone();
        tasks.spawn(async move {
            let _permit = sem.acquire_owned().await.context("janitor semaphore closed")?;
            sweep_one(&mirror, row, &deleted).await
        });
    }

    let mut progress = Progress::new();
    let mut swept = 0usize;
    while let Some(joined) = tasks.join_next().await {
        joined.context("janitor task died")??;
        swept += 1;
        if progress.due() {
            info!("swept {swept}/{total} artificial events in {:?}", progress.elapsed());
        }
    }

    let stats = JanitorStats {
        processed: total,
        deleted: *deleted.lock().expect("counter lock poisoned"),
    };
    info!(
        "processed {} artificial events, deleted {}",
        stats.processed, stats.deleted
    );
    Ok(stats)
}

/// Judge one synthetic event against its real neighbours; delete on a full
/// match. The successor is only queried when the predecessor already matched.
async fn sweep_one(mirror: &Mirror, row: ArtificialRow, deleted: &Mutex<u64>) -> Result<()> {
    let synthetic = NeighbourState {
        milestone_id: row.milestone_id,
        labels: mirror.label_set(row.event_id).await?,
    };

    let prior = mirror.prior_snapshot(row.issue_id, row.updated_at).await?;
    let prior_state = match &prior {
        Some(p) => Some(NeighbourState {
            milestone_id: p.milestone_id,
            labels: mirror.label_set(p.event_id).await?,
        }),
        None => None,
    };
    if let Some(reason) = judge_predecessor(&synthetic, prior_state.as_ref()) {
        debug!(
            "keeping artificial event {} on issue {}: {:?} (prior {:?})",
            row.event_id, row.issue_id, reason, prior
        );
        return Ok(());
    }

    let until = successor_window_end(row.updated_at);
    let next = mirror
        .next_snapshot_within(row.issue_id, row.updated_at, until)
        .await?;
    let next_state = match &next {
        Some(n) => Some(NeighbourState {
            milestone_id: n.milestone_id,
            labels: mirror.label_set(n.event_id).await?,
        }),
        None => None,
    };
    if let Some(reason) = judge_successor(&synthetic, next_state.as_ref()) {
        debug!(
            "keeping artificial event {} on issue {}: {:?} (next {:?})",
            row.event_id, row.issue_id, reason, next
        );
        return Ok(());
    }

    debug!(
        "removing artificial event {} on issue {}: milestone={:?} labels='{}' updated={}",
        row.event_id, row.issue_id, synthetic.milestone_id, synthetic.labels, row.updated_at
    );
    mirror.delete_synthetic(row.event_id).await?;
    *deleted.lock().expect("counter lock poisoned") += 1;
    Ok(())
}
