//! Candidate selection: the templated default set, and the explicit id-list
//! override used for forge-API debugging.

use anyhow::{Context, Result};
use fmr_config::Config;
use fmr_db::Mirror;
use fmr_reconcile::Candidate;
use std::collections::HashMap;
use tracing::{debug, info};

/// Produce this run's working set.
///
/// The default path runs the external SQL template over the mirror. When
/// `FMR_ONLY_ISSUES` is set the override wins entirely; override candidates
/// outside the default set are permitted and logged.
pub async fn select_candidates(cfg: &Config, mirror: &Mirror) -> Result<Vec<Candidate>> {
    let template = std::fs::read_to_string(&cfg.candidate_sql)
        .with_context(|| format!("read candidate template {}", cfg.candidate_sql))?;

    let mut defaults: HashMap<i64, Candidate> = HashMap::new();
    for cand in mirror.open_candidates(&template, &cfg.recent_range).await? {
        if let Some(existing) = defaults.get(&cand.issue_id) {
            debug!(
                "duplicate candidate for issue {}: kept {:?}, skipped {:?}",
                cand.issue_id, existing.repo, cand.repo
            );
            continue;
        }
        defaults.insert(cand.issue_id, cand);
    }
    debug!(
        "got {} open issues for period {}",
        defaults.len(),
        cfg.recent_range
    );

    if cfg.only_issues.is_empty() {
        return Ok(defaults.into_values().collect());
    }

    info!(
        "processing only selected {} issues for debugging: {:?}",
        cfg.only_issues.len(),
        cfg.only_issues
    );
    let mut overrides: HashMap<i64, Candidate> = HashMap::new();
    for cand in mirror.candidates_by_ids(&cfg.only_issues).await? {
        if overrides.contains_key(&cand.issue_id) {
            continue;
        }
        if defaults.contains_key(&cand.issue_id) {
            info!(
                "issue {} ({}#{}) would also be processed by the default workflow",
                cand.issue_id, cand.repo, cand.number
            );
        } else {
            info!(
                "issue {} ({}#{}) would not be processed by the default workflow",
                cand.issue_id, cand.repo, cand.number
            );
        }
        overrides.insert(cand.issue_id, cand);
    }
    info!(
        "processing {}/{} user provided issues",
        overrides.len(),
        cfg.only_issues.len()
    );
    Ok(overrides.into_values().collect())
}
