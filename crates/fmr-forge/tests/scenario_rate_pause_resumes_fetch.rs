//! Scenario: a depleted budget pauses one caller, which then proceeds once
//! the budget resets. The pause alone never changes the outcome.

use fmr_forge::{RateBudget, RateCheck, RateGovernor};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted budget: returns the queued observations in order, then repeats
/// the last one.
struct ScriptedBudget {
    script: Mutex<Vec<RateCheck>>,
    last: RateCheck,
}

impl ScriptedBudget {
    fn new(script: Vec<RateCheck>, last: RateCheck) -> Self {
        Self {
            script: Mutex::new(script),
            last,
        }
    }
}

#[async_trait::async_trait]
impl RateBudget for ScriptedBudget {
    async fn check(&self) -> RateCheck {
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            self.last
        } else {
            script.remove(0)
        }
    }
}

fn depleted(wait_secs: u64) -> RateCheck {
    RateCheck {
        remaining: 0,
        wait: Duration::from_secs(wait_secs),
    }
}

fn replenished() -> RateCheck {
    RateCheck {
        remaining: 5000,
        wait: Duration::from_secs(3600),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_depleted_budget_pauses_then_admits() {
    let budget = Arc::new(ScriptedBudget::new(vec![depleted(3)], replenished()));
    let governor = RateGovernor::new(budget, 100, 10, 3);

    let before = tokio::time::Instant::now();
    let check = governor.admit("issue data").await.expect("admitted");

    // wait(3s) + 1s safety sleep.
    assert!(before.elapsed() >= Duration::from_secs(4));
    assert_eq!(check.remaining, 5000);
}

#[tokio::test(start_paused = true)]
async fn scenario_wait_above_ceiling_fails_the_run() {
    let budget = Arc::new(ScriptedBudget::new(vec![], depleted(600)));
    let governor = RateGovernor::new(budget, 100, 10, 3);

    let err = governor.admit("issue data").await.unwrap_err();
    assert!(err.to_string().contains("don't want to wait"));
}

#[tokio::test(start_paused = true)]
async fn scenario_retry_exhaustion_is_fatal() {
    // Every observation is depleted with a short wait: the governor keeps
    // pausing until its bounded retries run out.
    let budget = Arc::new(ScriptedBudget::new(vec![], depleted(2)));
    let governor = RateGovernor::new(budget, 100, 10, 4);

    let err = governor.admit("issue labels").await.unwrap_err();
    assert!(err.to_string().contains("failed 4 times"));
}

#[tokio::test(start_paused = true)]
async fn scenario_failed_probe_degrades_and_recovers() {
    // A probe failure surfaces as remaining = -1 with a 5s pause; the next
    // observation admits.
    let probe_failure = RateCheck {
        remaining: -1,
        wait: Duration::from_secs(5),
    };
    let budget = Arc::new(ScriptedBudget::new(vec![probe_failure], replenished()));
    let governor = RateGovernor::new(budget, 1, 30, 3);

    let check = governor.admit("issue data").await.expect("admitted");
    assert_eq!(check.remaining, 5000);
}
