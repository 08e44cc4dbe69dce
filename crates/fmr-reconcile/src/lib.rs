//! fmr-reconcile
//!
//! Decision core of the forge-mirror reconciler:
//! - Synthetic event-id arithmetic (the 2^48 partition)
//! - Canonical label-set strings
//! - Four-axis drift detection against the mirror's latest snapshot
//! - Per-second candidate normalisation
//! - Janitor redundancy verdicts
//!
//! Deterministic, pure logic. No IO. No database or forge calls.

mod engine;
mod ids;
mod janitor;
mod types;

pub use engine::{diff, normalize_candidates, DiffDecision, DriftAxis, DriftReport};
pub use ids::{is_synthetic, label_set_string, synthetic_event_id, SYNTHETIC_EVENT_BASE};
pub use janitor::{
    judge_artificial, judge_predecessor, judge_successor, successor_window_end, JanitorVerdict,
    KeepReason, NeighbourState,
};
pub use types::*;
