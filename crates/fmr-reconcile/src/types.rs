use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// An actor referenced by an issue (author, assignee, milestone creator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorRef {
    pub id: i64,
    pub login: String,
}

/// Milestone metadata as reported by the forge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MilestoneRef {
    pub id: i64,
    pub title: Option<String>,
    pub state: Option<String>,
    pub number: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub creator: Option<ActorRef>,
}

/// Authoritative issue state fetched from the forge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedIssue {
    pub title: Option<String>,
    pub body: Option<String>,
    /// Canonical state name ("open" / "closed").
    pub state: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub user: Option<ActorRef>,
    pub assignee: Option<ActorRef>,
    pub assignees: Vec<ActorRef>,
    pub milestone: Option<MilestoneRef>,
}

/// One issue/PR eligible for reconciliation this run.
///
/// Created by the candidate selector with the identity fields only; the fetch
/// stage fills in the forge-side state and stamps `created_at`. Each candidate
/// is owned by exactly one fetch task and then one diff task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Full repository name, `owner/repo`.
    pub repo: String,
    pub number: i32,
    pub issue_id: i64,
    pub is_pr: bool,
    /// Forge milestone id, when the issue carries one.
    pub milestone_id: Option<i64>,
    /// label id -> label name, as fetched.
    pub labels_map: BTreeMap<i64, String>,
    /// Canonical label-set string derived from `labels_map`.
    pub labels: String,
    /// Full issue record, present once the fetch stage succeeded.
    pub issue: Option<ObservedIssue>,
    /// Timestamp at which the forge state was observed.
    pub created_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn new(repo: impl Into<String>, number: i32, issue_id: i64, is_pr: bool) -> Self {
        Self {
            repo: repo.into(),
            number,
            issue_id,
            is_pr,
            milestone_id: None,
            labels_map: BTreeMap::new(),
            labels: String::new(),
            issue: None,
            created_at: None,
        }
    }

    /// The four comparison axes, available once the fetch stage completed.
    pub fn observed_state(&self) -> Option<ObservedState> {
        let issue = self.issue.as_ref()?;
        Some(ObservedState {
            milestone_id: self.milestone_id,
            state: issue.state.clone(),
            closed_at: issue.closed_at,
            labels: self.labels.clone(),
        })
    }
}

/// The forge-side values entering the four-axis comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedState {
    pub milestone_id: Option<i64>,
    pub state: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub labels: String,
}

/// A single `issues` row as read from the mirror.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirrorSnapshot {
    pub event_id: i64,
    pub milestone_id: Option<i64>,
    pub closed_at: Option<DateTime<Utc>>,
    pub state: String,
}

/// Snapshot plus its canonical label-set string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MirrorState {
    pub snapshot: MirrorSnapshot,
    pub labels: String,
}
