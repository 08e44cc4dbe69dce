use crate::{Candidate, MirrorState, ObservedState};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One comparison axis that diverged between forge and mirror.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriftAxis {
    ClosedAt,
    State,
    Milestone,
    Labels,
}

/// What the diff stage should do for one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffDecision {
    /// The mirror has no snapshot at the candidate's timestamp: emit a brand
    /// new synthetic event.
    MissingSnapshot,
    /// At least one axis differs from the latest snapshot: emit keyed on the
    /// prior event's id.
    Drifted { prior_event_id: i64 },
    /// All four axes agree. No write.
    InSync,
}

/// Full diff result. `axes` is empty unless the decision is `Drifted`,
/// and is sorted for deterministic output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriftReport {
    pub decision: DiffDecision,
    pub axes: Vec<DriftAxis>,
}

impl DriftReport {
    /// `true` when the diff stage must write a synthetic event.
    pub fn needs_emit(&self) -> bool {
        !matches!(self.decision, DiffDecision::InSync)
    }
}

/// Closure-time equality: both null are equal, one-sided null is drift,
/// otherwise the timestamps are compared truncated to whole seconds.
fn closed_at_equal(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            x.format("%Y-%m-%d %H:%M:%S").to_string() == y.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        _ => false,
    }
}

/// Compare the authoritative forge state against the mirror's latest snapshot.
///
/// `mirror` is `None` when the mirror holds no row for the issue at the
/// candidate's timestamp.
pub fn diff(observed: &ObservedState, mirror: Option<&MirrorState>) -> DriftReport {
    let mirror = match mirror {
        Some(m) => m,
        None => {
            return DriftReport {
                decision: DiffDecision::MissingSnapshot,
                axes: Vec::new(),
            }
        }
    };

    let mut axes: Vec<DriftAxis> = Vec::new();

    if !closed_at_equal(observed.closed_at, mirror.snapshot.closed_at) {
        axes.push(DriftAxis::ClosedAt);
    }
    if observed.state != mirror.snapshot.state {
        axes.push(DriftAxis::State);
    }
    if observed.milestone_id != mirror.snapshot.milestone_id {
        axes.push(DriftAxis::Milestone);
    }
    if observed.labels != mirror.labels {
        axes.push(DriftAxis::Labels);
    }

    axes.sort();

    if axes.is_empty() {
        DriftReport {
            decision: DiffDecision::InSync,
            axes,
        }
    } else {
        DriftReport {
            decision: DiffDecision::Drifted {
                prior_event_id: mirror.snapshot.event_id,
            },
            axes,
        }
    }
}

/// Normalise fetched candidates to one per `(issue_id, second)`, where the
/// latest observation within a second wins, then sort ascending by
/// observation time.
///
/// The diff stage relies on this ordering: synthetic event ids stay monotone
/// even when many reconciliations of one issue collide in time. Candidates
/// that never completed the fetch stage carry no timestamp and are dropped.
pub fn normalize_candidates(all: Vec<Candidate>) -> Vec<Candidate> {
    let mut per_second: BTreeMap<(i64, i64), Candidate> = BTreeMap::new();

    for cand in all {
        let at = match cand.created_at {
            Some(at) => at,
            None => continue,
        };
        let key = (cand.issue_id, at.timestamp());
        let replace = match per_second.get(&key) {
            Some(existing) => existing.created_at < cand.created_at,
            None => true,
        };
        if replace {
            per_second.insert(key, cand);
        }
    }

    let mut out: Vec<Candidate> = per_second.into_values().collect();
    out.sort_by_key(|c| (c.created_at, c.issue_id));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn closed_at_subsecond_difference_is_equal() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(250);
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(closed_at_equal(Some(a), Some(b)));
    }

    #[test]
    fn closed_at_one_sided_null_is_drift() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(!closed_at_equal(Some(a), None));
        assert!(!closed_at_equal(None, Some(a)));
        assert!(closed_at_equal(None, None));
    }
}
