use chrono::{TimeZone, Utc};
use fmr_reconcile::*;

#[test]
fn scenario_missing_snapshot_triggers_insert() {
    let observed = ObservedState {
        milestone_id: None,
        state: "open".to_string(),
        closed_at: None,
        labels: String::new(),
    };

    let report = diff(&observed, None);
    assert_eq!(report.decision, DiffDecision::MissingSnapshot);
    assert!(report.axes.is_empty());
    assert!(report.needs_emit());
}

#[test]
fn scenario_missing_snapshot_candidate_carries_identity() {
    let mut cand = Candidate::new("kubernetes/kubernetes", 7, 7, false);
    cand.issue = Some(ObservedIssue {
        title: Some("flaky e2e".to_string()),
        body: None,
        state: "open".to_string(),
        closed_at: None,
        user: None,
        assignee: None,
        assignees: vec![],
        milestone: None,
    });
    cand.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());

    let observed = cand.observed_state().expect("fetched candidate");
    assert_eq!(observed.labels, "");
    assert_eq!(diff(&observed, None).decision, DiffDecision::MissingSnapshot);
}
