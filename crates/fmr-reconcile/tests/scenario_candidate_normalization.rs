use chrono::{Duration, TimeZone, Utc};
use fmr_reconcile::*;

fn fetched(issue_id: i64, at: chrono::DateTime<Utc>) -> Candidate {
    let mut c = Candidate::new("acme/widgets", issue_id as i32, issue_id, false);
    c.issue = Some(ObservedIssue {
        title: None,
        body: None,
        state: "open".to_string(),
        closed_at: None,
        user: None,
        assignee: None,
        assignees: vec![],
        milestone: None,
    });
    c.created_at = Some(at);
    c
}

#[test]
fn scenario_latest_observation_wins_within_a_second() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let early = fetched(7, base + Duration::milliseconds(100));
    let late = fetched(7, base + Duration::milliseconds(900));

    let out = normalize_candidates(vec![late.clone(), early]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].created_at, late.created_at);
}

#[test]
fn scenario_distinct_seconds_survive_and_sort_ascending() {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    let c1 = fetched(7, base + Duration::seconds(2));
    let c2 = fetched(7, base);
    let c3 = fetched(3, base + Duration::seconds(1));

    let out = normalize_candidates(vec![c1, c2, c3]);
    let times: Vec<_> = out.iter().map(|c| c.created_at.unwrap()).collect();
    assert_eq!(out.len(), 3);
    assert!(times.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(out[0].issue_id, 7);
    assert_eq!(out[1].issue_id, 3);
}

#[test]
fn scenario_unfetched_candidates_are_dropped() {
    let never_fetched = Candidate::new("acme/widgets", 9, 9, true);
    let out = normalize_candidates(vec![never_fetched]);
    assert!(out.is_empty());
}
