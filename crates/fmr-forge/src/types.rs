//! Wire shapes for the forge endpoints in use, plus the adapters into the
//! reconciler's own vocabulary.

use chrono::{DateTime, Utc};
use fmr_reconcile::{ActorRef, MilestoneRef, ObservedIssue};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ForgeActor {
    pub id: i64,
    pub login: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ForgeLabel {
    pub id: i64,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ForgeMilestone {
    pub id: i64,
    pub title: Option<String>,
    pub state: Option<String>,
    pub number: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub creator: Option<ForgeActor>,
}

/// An issue as served by `GET /repos/{owner}/{repo}/issues/{number}`.
/// Only the fields the reconciler consumes are decoded.
#[derive(Clone, Debug, Deserialize)]
pub struct ForgeIssue {
    pub id: i64,
    pub number: i32,
    pub title: Option<String>,
    pub body: Option<String>,
    pub state: String,
    pub closed_at: Option<DateTime<Utc>>,
    pub user: Option<ForgeActor>,
    pub assignee: Option<ForgeActor>,
    #[serde(default)]
    pub assignees: Vec<ForgeActor>,
    pub milestone: Option<ForgeMilestone>,
}

impl ForgeActor {
    pub fn into_ref(self) -> ActorRef {
        ActorRef {
            id: self.id,
            login: self.login,
        }
    }
}

impl ForgeMilestone {
    pub fn into_ref(self) -> MilestoneRef {
        MilestoneRef {
            id: self.id,
            title: self.title,
            state: self.state,
            number: self.number,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            creator: self.creator.map(ForgeActor::into_ref),
        }
    }
}

impl ForgeIssue {
    /// Reduce the wire record to the state the diff stage compares and the
    /// emit transaction persists.
    pub fn into_observed(self) -> ObservedIssue {
        ObservedIssue {
            title: self.title,
            body: self.body,
            state: self.state,
            closed_at: self.closed_at,
            user: self.user.map(ForgeActor::into_ref),
            assignee: self.assignee.map(ForgeActor::into_ref),
            assignees: self.assignees.into_iter().map(ForgeActor::into_ref).collect(),
            milestone: self.milestone.map(ForgeMilestone::into_ref),
        }
    }
}

// Rate-limit probe payload: only the core bucket is consulted.

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub resources: RateResources,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RateResources {
    pub core: RateBucket,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RateBucket {
    pub remaining: i64,
    /// Reset instant as UTC epoch seconds.
    pub reset: i64,
}
