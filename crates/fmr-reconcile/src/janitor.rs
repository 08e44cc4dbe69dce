//! Redundancy verdicts for synthetic events.
//!
//! A synthetic event is redundant iff both its most recent non-synthetic
//! predecessor *and* a non-synthetic successor inside the two-hour grace
//! window carry the identical (milestone, label-set) pair. A successor outside
//! the window is not evidence of redundancy: further drift may have occurred.
//!
//! Per synthetic event the verdict is terminal:
//! `Candidate → {NoPredecessor | PriorDiffers | NoSuccessor | NextDiffers} → Kept`
//! or `Candidate → AllMatch → Deleted`.

use chrono::{DateTime, Duration, DurationRound, Utc};

/// The (milestone, label-set) pair of a snapshot entering a janitor
/// comparison: the synthetic event itself or one of its neighbours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighbourState {
    pub milestone_id: Option<i64>,
    /// Canonical label-set string.
    pub labels: String,
}

/// Why a synthetic event survived the sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeepReason {
    /// No non-synthetic snapshot exists before the event; redundancy cannot
    /// be established.
    NoPredecessor,
    PriorMilestoneDiffers,
    PriorLabelsDiffer,
    /// No real successor inside the grace window yet; we cannot judge.
    NoSuccessor,
    NextMilestoneDiffers,
    NextLabelsDiffer,
}

/// Terminal verdict for one synthetic event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JanitorVerdict {
    Delete,
    Keep(KeepReason),
}

/// End of the successor grace window: two hours from the start of the
/// synthetic event's hour.
pub fn successor_window_end(updated_at: DateTime<Utc>) -> DateTime<Utc> {
    let hour_start = updated_at
        .duration_trunc(Duration::hours(1))
        .expect("hour truncation cannot overflow");
    hour_start + Duration::hours(2)
}

/// Compare the synthetic event against its predecessor. `None` means the
/// predecessor check passed and the successor must now be consulted.
pub fn judge_predecessor(
    synthetic: &NeighbourState,
    prior: Option<&NeighbourState>,
) -> Option<KeepReason> {
    let prior = match prior {
        Some(p) => p,
        None => return Some(KeepReason::NoPredecessor),
    };
    if prior.milestone_id != synthetic.milestone_id {
        return Some(KeepReason::PriorMilestoneDiffers);
    }
    if prior.labels != synthetic.labels {
        return Some(KeepReason::PriorLabelsDiffer);
    }
    None
}

/// Compare the synthetic event against its earliest in-window successor.
/// `None` means the successor also matches and the event is redundant.
pub fn judge_successor(
    synthetic: &NeighbourState,
    next: Option<&NeighbourState>,
) -> Option<KeepReason> {
    let next = match next {
        Some(n) => n,
        None => return Some(KeepReason::NoSuccessor),
    };
    if next.milestone_id != synthetic.milestone_id {
        return Some(KeepReason::NextMilestoneDiffers);
    }
    if next.labels != synthetic.labels {
        return Some(KeepReason::NextLabelsDiffer);
    }
    None
}

/// Full verdict from both neighbours at once.
///
/// The sweep itself uses [`judge_predecessor`] first and only queries the
/// successor when the predecessor matched; this combined form exists for
/// callers that already hold both neighbours.
pub fn judge_artificial(
    synthetic: &NeighbourState,
    prior: Option<&NeighbourState>,
    next: Option<&NeighbourState>,
) -> JanitorVerdict {
    if let Some(reason) = judge_predecessor(synthetic, prior) {
        return JanitorVerdict::Keep(reason);
    }
    if let Some(reason) = judge_successor(synthetic, next) {
        return JanitorVerdict::Keep(reason);
    }
    JanitorVerdict::Delete
}
