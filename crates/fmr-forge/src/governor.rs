//! Rate governor.
//!
//! The forge enforces a hard per-hour budget *and* an opaque abuse heuristic
//! that fires under high parallelism. A sequential budget check before every
//! request is the only portable defence, so every caller funnels through
//! [`RateGovernor::admit`] first.

use crate::client::ForgeError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One observation of the declared budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCheck {
    /// Remaining core-API points; negative when the probe itself failed.
    pub remaining: i64,
    /// Time until the budget resets, including the safety margin.
    pub wait: Duration,
}

/// Source of budget observations. The production implementation probes the
/// forge's rate-limit endpoint; tests substitute a scripted fake.
#[async_trait::async_trait]
pub trait RateBudget: Send + Sync {
    async fn check(&self) -> RateCheck;
}

/// Admission control around the budget, shared by all fetch tasks.
#[derive(Clone)]
pub struct RateGovernor<B: RateBudget> {
    budget: Arc<B>,
    min_points: i64,
    max_wait: Duration,
    max_retries: usize,
}

impl<B: RateBudget> RateGovernor<B> {
    pub fn new(budget: Arc<B>, min_points: i64, max_wait_secs: i64, max_retries: usize) -> Self {
        Self {
            budget,
            min_points,
            max_wait: Duration::from_secs(max_wait_secs.max(0) as u64),
            max_retries: max_retries.max(1),
        }
    }

    /// Block until the budget admits one more request, or fail the run.
    ///
    /// Discipline, per attempt:
    /// 1. read `(remaining, wait)`;
    /// 2. `remaining > min_points` ⇒ proceed;
    /// 3. `wait ≤ max_wait` ⇒ sleep `wait + 1s` and retry;
    /// 4. otherwise refuse to stall past the operator ceiling.
    ///
    /// `what` labels the log lines ("issue data", "issue labels").
    pub async fn admit(&self, what: &str) -> Result<RateCheck, ForgeError> {
        for attempt in 1..=self.max_retries {
            let check = self.budget.check().await;
            if check.remaining > self.min_points {
                return Ok(check);
            }
            if check.wait <= self.max_wait {
                info!(
                    "API limit reached while getting {what}, waiting {:?} ({attempt})",
                    check.wait
                );
                tokio::time::sleep(Duration::from_secs(1)).await;
                tokio::time::sleep(check.wait).await;
                continue;
            }
            return Err(ForgeError::Budget(format!(
                "API limit reached while getting {what}, aborting, don't want to wait {:?}",
                check.wait
            )));
        }
        Err(ForgeError::Budget(format!(
            "budget check failed {} times while getting {what}, aborting",
            self.max_retries
        )))
    }

    /// Current budget observation, for progress logs and the run summary.
    pub async fn snapshot(&self) -> RateCheck {
        self.budget.check().await
    }
}
