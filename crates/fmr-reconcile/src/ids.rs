//! Synthetic event-id arithmetic and the canonical label-set form.

/// Base of the synthetic event-id range: 2^48.
///
/// Real forge event ids are far below this value, so adding the base to a
/// source event id yields a globally unique id in a reserved high range.
/// Downstream queries rely on this partition.
pub const SYNTHETIC_EVENT_BASE: i64 = 281_474_976_710_656;

/// Derive the synthetic event id for a source event.
///
/// A source already inside the synthetic range keeps its id, so re-emitting
/// for the same source targets the same row instead of stacking offsets.
pub fn synthetic_event_id(source_event_id: i64) -> i64 {
    if source_event_id >= SYNTHETIC_EVENT_BASE {
        source_event_id
    } else {
        SYNTHETIC_EVENT_BASE + source_event_id
    }
}

/// `true` when `event_id` lies in the synthetic range.
pub fn is_synthetic(event_id: i64) -> bool {
    event_id > SYNTHETIC_EVENT_BASE
}

/// Canonical label-set form: ascending label ids joined by commas.
///
/// Both sides of every label comparison (forge fetch, mirror query, janitor
/// neighbours) reduce to this string, so equality is byte-exact.
pub fn label_set_string<I>(ids: I) -> String
where
    I: IntoIterator<Item = i64>,
{
    let mut sorted: Vec<i64> = ids.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();
    let mut out = String::new();
    for (i, id) in sorted.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&id.to_string());
    }
    out
}
