//! The reconciler pipeline: rate-governed forge fetch, then diff+emit.

use crate::select::select_candidates;
use crate::Progress;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use fmr_config::Config;
use fmr_db::{EmitOutcome, Mirror};
use fmr_forge::{ForgeClient, RateGovernor};
use fmr_reconcile::{
    diff, label_set_string, normalize_candidates, Candidate, DiffDecision, MirrorState,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Hard ceiling on concurrent fetch tasks, regardless of core count.
///
/// The forge's abuse detection fires at 32 parallel callers but tolerates 16,
/// so this is a contract with the forge, not a tunable.
pub const FETCH_WORKERS: usize = 16;

fn fetch_cap(threads: usize) -> usize {
    FETCH_WORKERS.min(threads.max(1))
}

/// Counters and final budget reading for one reconcile run.
#[derive(Clone, Debug)]
pub struct ReconcileStats {
    pub processed: usize,
    pub inserted: u64,
    pub updated: u64,
    pub remaining_api: i64,
    pub reset_in: std::time::Duration,
}

/// Full reconcile pass: candidate selection, fetch stage, diff+emit stage.
pub async fn reconcile_run(
    cfg: &Config,
    mirror: &Mirror,
    forge: Arc<ForgeClient>,
) -> Result<ReconcileStats> {
    let governor = Arc::new(RateGovernor::new(
        forge.clone(),
        cfg.min_api_points,
        cfg.max_api_wait_secs,
        cfg.max_api_retries,
    ));
    let threads = cfg.threads();

    let initial = governor.snapshot().await;
    info!(
        "reconciler running on {} workers: {} API points available, resets in {:?}",
        threads, initial.remaining, initial.wait
    );

    let candidates = select_candidates(cfg, mirror).await?;
    let total = candidates.len();
    info!("processing {total} issues - forge fetch stage");

    let shared: Arc<RwLock<HashMap<i64, Candidate>>> = Arc::new(RwLock::new(
        candidates.into_iter().map(|c| (c.issue_id, c)).collect(),
    ));
    let keys: Vec<i64> = shared.read().await.keys().copied().collect();

    let sem = Arc::new(Semaphore::new(fetch_cap(threads)));
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    for issue_id in keys {
        let sem = sem.clone();
        let shared = shared.clone();
        let forge = forge.clone();
        let governor = governor.clone();
        let retries = cfg.max_api_retries;
        tasks.spawn(async move {
            let _permit = sem.acquire_owned().await.context("fetch semaphore closed")?;
            fetch_one(issue_id, &shared, &forge, &governor, retries).await
        });
    }

    let mut progress = Progress::new();
    let mut checked = 0usize;
    while let Some(joined) = tasks.join_next().await {
        joined.context("fetch task died")??;
        checked += 1;
        if progress.due() {
            let check = governor.snapshot().await;
            info!(
                "fetched {checked}/{total} issues in {:?}, API points: {}, resets in: {:?}",
                progress.elapsed(),
                check.remaining,
                check.wait
            );
        }
    }

    // Fetch is complete; the map is exclusively ours again.
    let fetched: Vec<Candidate> = shared.write().await.drain().map(|(_, c)| c).collect();
    let batch = normalize_candidates(fetched);
    info!("diffing {} candidates - mirror stage", batch.len());

    // Group per issue so same-issue candidates replay in ascending order
    // inside one task; the normalisation sort above fixed that order.
    let mut per_issue: BTreeMap<i64, Vec<Candidate>> = BTreeMap::new();
    for cand in batch {
        per_issue.entry(cand.issue_id).or_default().push(cand);
    }

    let inserted = Arc::new(Mutex::new(0u64));
    let updated = Arc::new(Mutex::new(0u64));
    let sem = Arc::new(Semaphore::new(threads.max(1)));
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    for (_issue_id, cands) in per_issue {
        let sem = sem.clone();
        let mirror = mirror.clone();
        let inserted = inserted.clone();
        let updated = updated.clone();
        tasks.spawn(async move {
            let _permit = sem.acquire_owned().await.context("diff semaphore closed")?;
            diff_issue(&mirror, cands, &inserted, &updated).await
        });
    }

    let mut progress = Progress::new();
    let mut diffed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        joined.context("diff task died")??;
        diffed += 1;
        if progress.due() {
            info!("diffed {diffed} issues in {:?}", progress.elapsed());
        }
    }

    let final_check = governor.snapshot().await;
    let stats = ReconcileStats {
        processed: total,
        inserted: *inserted.lock().expect("counter lock poisoned"),
        updated: *updated.lock().expect("counter lock poisoned"),
        remaining_api: final_check.remaining,
        reset_in: final_check.wait,
    };
    info!(
        "processed={} updated={} inserted={} remaining_api={} reset_in={:?}",
        stats.processed, stats.updated, stats.inserted, stats.remaining_api, stats.reset_in
    );
    Ok(stats)
}

/// Fetch one candidate's authoritative state and publish it back into the
/// shared map. Malformed input skips with a warning; transient forge errors
/// retry up to `retries` times; anything else is fatal.
async fn fetch_one(
    issue_id: i64,
    shared: &RwLock<HashMap<i64, Candidate>>,
    forge: &ForgeClient,
    governor: &RateGovernor<ForgeClient>,
    retries: usize,
) -> Result<()> {
    let mut cand = match shared.read().await.get(&issue_id) {
        Some(c) => c.clone(),
        None => return Ok(()),
    };

    let (owner, repo) = match cand.repo.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            (owner.to_string(), repo.to_string())
        }
        _ => {
            warn!("wrong repository name: {}", cand.repo);
            return Ok(());
        }
    };

    let mut issue = None;
    for attempt in 1..=retries {
        governor.admit("issue data").await?;
        match forge.get_issue(&owner, &repo, cand.number).await {
            Ok(got) => {
                issue = Some(got);
                break;
            }
            Err(err) if err.is_transient() => {
                warn!(
                    "transient forge error for {}#{} (attempt {attempt}): {err}",
                    cand.repo, cand.number
                );
            }
            Err(err) if err.is_not_found() => {
                warn!(
                    "issue {}#{} is gone from the forge, skipping",
                    cand.repo, cand.number
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
    let issue = match issue {
        Some(i) => i,
        None => bail!(
            "fetching issue data for {}#{} failed {retries} times",
            cand.repo,
            cand.number
        ),
    };

    if let Some(milestone) = &issue.milestone {
        cand.milestone_id = Some(milestone.id);
    }

    let mut page = 1u32;
    loop {
        let mut fetched = None;
        for attempt in 1..=retries {
            governor.admit("issue labels").await?;
            match forge.list_labels(&owner, &repo, cand.number, page).await {
                Ok(got) => {
                    fetched = Some(got);
                    break;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        "transient forge error for {}#{} labels page {page} (attempt {attempt}): {err}",
                        cand.repo, cand.number
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        let (labels, next) = match fetched {
            Some(got) => got,
            None => bail!(
                "fetching issue labels for {}#{} failed {retries} times",
                cand.repo,
                cand.number
            ),
        };
        for label in labels {
            cand.labels_map.insert(label.id, label.name);
        }
        // Paging is rare for labels but still honoured.
        match next {
            Some(next_page) => page = next_page,
            None => break,
        }
    }

    cand.labels = label_set_string(cand.labels_map.keys().copied());
    cand.issue = Some(issue.into_observed());
    cand.created_at = Some(Utc::now());
    debug!(
        "fetched issue {} ({}#{}): milestone={:?} labels='{}'",
        cand.issue_id, cand.repo, cand.number, cand.milestone_id, cand.labels
    );

    shared.write().await.insert(issue_id, cand);
    Ok(())
}

/// Diff and possibly emit for all of one issue's candidates, oldest first.
async fn diff_issue(
    mirror: &Mirror,
    cands: Vec<Candidate>,
    inserted: &Mutex<u64>,
    updated: &Mutex<u64>,
) -> Result<()> {
    for cand in cands {
        let (observed, at) = match (cand.observed_state(), cand.created_at) {
            (Some(observed), Some(at)) => (observed, at),
            _ => continue,
        };

        let mirror_state = match mirror.latest_snapshot(cand.issue_id, at).await? {
            Some(snapshot) => {
                let labels = mirror.label_set(snapshot.event_id).await?;
                Some(MirrorState { snapshot, labels })
            }
            None => None,
        };

        let report = diff(&observed, mirror_state.as_ref());
        match report.decision {
            DiffDecision::MissingSnapshot => {
                mirror.emit_synthetic(&cand, 0).await?;
                debug!(
                    "added missing issue {} ({}#{})",
                    cand.issue_id, cand.repo, cand.number
                );
                *inserted.lock().expect("counter lock poisoned") += 1;
            }
            DiffDecision::Drifted { prior_event_id } => {
                debug!(
                    "issue {} drifted on {:?} against event {}",
                    cand.issue_id, report.axes, prior_event_id
                );
                match mirror.emit_synthetic(&cand, prior_event_id).await? {
                    EmitOutcome::Inserted => {
                        *inserted.lock().expect("counter lock poisoned") += 1
                    }
                    EmitOutcome::Updated => *updated.lock().expect("counter lock poisoned") += 1,
                }
            }
            DiffDecision::InSync => {}
        }
    }
    Ok(())
}
