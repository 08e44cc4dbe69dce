//! fmr-forge
//!
//! Thin wrapper around the forge's HTTP API: issue reads, issue-label listing
//! with paging, the rate-limit probe, and the governor that keeps every caller
//! inside the declared API budget. No database logic belongs here; callers
//! hand fetched state to fmr-db.

mod client;
mod governor;
mod types;

pub use client::{resolve_token, ForgeClient, ForgeError};
pub use governor::{RateBudget, RateCheck, RateGovernor};
pub use types::{ForgeActor, ForgeIssue, ForgeLabel, ForgeMilestone};
