//! The synthetic-event write path.
//!
//! All rows of one emission share a single derived event id and a single
//! timestamp, and land in one transaction. The synthetic actor
//! `(0, "devstats-bot")` is recorded in every audit column so downstream
//! analytics can tell reconciliation writes from real feed events.

use crate::Mirror;
use anyhow::{anyhow, Context, Result};
use fmr_reconcile::{is_synthetic, synthetic_event_id, ActorRef, Candidate};
use sqlx::{Postgres, Transaction};
use tracing::debug;

/// Synthetic event type name; part of the mirror's external contract.
pub const ARTIFICIAL_EVENT_TYPE: &str = "ArtificialEvent";

/// Audit actor recorded on every synthetic write.
const BOT_ACTOR_ID: i64 = 0;
const BOT_ACTOR_LOGIN: &str = "devstats-bot";

/// Which shape the emission took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitOutcome {
    /// A brand new synthetic row set was inserted.
    Inserted,
    /// The latest snapshot was already synthetic; its rows were refreshed in
    /// place.
    Updated,
}

impl Mirror {
    /// Write one synthetic event for `cand` in a single transaction.
    ///
    /// `prior_event_id` is the event id of the mirror's latest snapshot, or 0
    /// when the mirror held none (the missing-issue path, which derives the
    /// synthetic id from the issue id instead). A prior that is itself
    /// synthetic selects the update path: the derived id is the prior's own
    /// id, so the existing rows are refreshed rather than duplicated.
    pub async fn emit_synthetic(
        &self,
        cand: &Candidate,
        prior_event_id: i64,
    ) -> Result<EmitOutcome> {
        let issue = cand
            .issue
            .as_ref()
            .ok_or_else(|| anyhow!("candidate {} was never fetched", cand.issue_id))?;
        let now = cand
            .created_at
            .ok_or_else(|| anyhow!("candidate {} has no fetch timestamp", cand.issue_id))?;

        let source = if prior_event_id > 0 {
            prior_event_id
        } else {
            cand.issue_id
        };
        let event_id = synthetic_event_id(source);
        let new_event = !is_synthetic(prior_event_id);
        let outcome = if new_event {
            EmitOutcome::Inserted
        } else {
            EmitOutcome::Updated
        };

        if self.skip_persist {
            debug!(
                "skipping artificial event write: issue_id={} event_id={}",
                cand.issue_id, event_id
            );
            return Ok(outcome);
        }

        let repo_id = self.repo_id_by_name(&cand.repo).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin artificial event transaction")?;

        upsert_actors(&mut tx, issue_actors(issue)).await?;

        if new_event {
            sqlx::query(
                r#"
                insert into events (event_id, type, actor_id, repo_id, public, created_at)
                values ($1, $2, $3, $4, true, $5)
                "#,
            )
            .bind(event_id)
            .bind(ARTIFICIAL_EVENT_TYPE)
            .bind(BOT_ACTOR_ID)
            .bind(repo_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("insert into events failed")?;

            sqlx::query(
                r#"
                insert into issues (
                    issue_id, event_id, repo_id, repo_name, number, is_pull_request,
                    milestone_id, state, closed_at, assignee_id, user_id, title, body,
                    updated_at
                ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(cand.issue_id)
            .bind(event_id)
            .bind(repo_id)
            .bind(&cand.repo)
            .bind(cand.number)
            .bind(cand.is_pr)
            .bind(cand.milestone_id)
            .bind(&issue.state)
            .bind(issue.closed_at)
            .bind(issue.assignee.as_ref().map(|a| a.id))
            .bind(issue.user.as_ref().map(|u| u.id))
            .bind(&issue.title)
            .bind(&issue.body)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("insert into issues failed")?;

            sqlx::query(
                r#"
                insert into payloads (event_id, action, issue_id, number, created_at)
                values ($1, 'artificial', $2, $3, $4)
                "#,
            )
            .bind(event_id)
            .bind(cand.issue_id)
            .bind(cand.number)
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("insert into payloads failed")?;

            if let Some(milestone) = &issue.milestone {
                sqlx::query(
                    r#"
                    insert into milestones (
                        milestone_id, event_id, state, title, number,
                        created_at, updated_at, closed_at
                    ) values ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(milestone.id)
                .bind(event_id)
                .bind(&milestone.state)
                .bind(&milestone.title)
                .bind(milestone.number)
                .bind(milestone.created_at)
                .bind(milestone.updated_at)
                .bind(milestone.closed_at)
                .execute(&mut *tx)
                .await
                .context("insert into milestones failed")?;
            }
        } else {
            sqlx::query(
                r#"
                update issues
                set milestone_id = $1, state = $2, closed_at = $3,
                    assignee_id = $4, user_id = $5
                where issue_id = $6 and event_id = $7
                "#,
            )
            .bind(cand.milestone_id)
            .bind(&issue.state)
            .bind(issue.closed_at)
            .bind(issue.assignee.as_ref().map(|a| a.id))
            .bind(issue.user.as_ref().map(|u| u.id))
            .bind(cand.issue_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("update issues failed")?;

            sqlx::query("update events set type = $1, actor_id = $2 where event_id = $3")
                .bind(ARTIFICIAL_EVENT_TYPE)
                .bind(BOT_ACTOR_ID)
                .bind(event_id)
                .execute(&mut *tx)
                .await
                .context("update events failed")?;

            sqlx::query(
                "update payloads set action = 'artificial', issue_id = $1, number = $2 where event_id = $3",
            )
            .bind(cand.issue_id)
            .bind(cand.number)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("update payloads failed")?;

            sqlx::query("delete from issue_labels where event_id = $1")
                .bind(event_id)
                .execute(&mut *tx)
                .await
                .context("replace issue_labels failed")?;
        }

        for label_id in cand.labels_map.keys() {
            sqlx::query(
                "insert into issue_labels (issue_id, event_id, label_id) values ($1, $2, $3)",
            )
            .bind(cand.issue_id)
            .bind(event_id)
            .bind(*label_id)
            .execute(&mut *tx)
            .await
            .context("insert into issue_labels failed")?;
        }

        tx.commit()
            .await
            .context("commit artificial event transaction")?;
        Ok(outcome)
    }
}

/// Every actor the issue references: author, assignee, assignees list,
/// milestone creator.
fn issue_actors(issue: &fmr_reconcile::ObservedIssue) -> Vec<&ActorRef> {
    let mut actors: Vec<&ActorRef> = Vec::new();
    if let Some(user) = &issue.user {
        actors.push(user);
    }
    if let Some(assignee) = &issue.assignee {
        actors.push(assignee);
    }
    for assignee in &issue.assignees {
        actors.push(assignee);
    }
    if let Some(creator) = issue.milestone.as_ref().and_then(|m| m.creator.as_ref()) {
        actors.push(creator);
    }
    actors
}

/// Insert-if-absent for every referenced actor plus the synthetic bot.
async fn upsert_actors(tx: &mut Transaction<'_, Postgres>, actors: Vec<&ActorRef>) -> Result<()> {
    sqlx::query(
        "insert into actors (actor_id, login) values ($1, $2) on conflict (actor_id) do nothing",
    )
    .bind(BOT_ACTOR_ID)
    .bind(BOT_ACTOR_LOGIN)
    .execute(&mut **tx)
    .await
    .context("insert bot actor failed")?;

    for actor in actors {
        sqlx::query(
            "insert into actors (actor_id, login) values ($1, $2) on conflict (actor_id) do nothing",
        )
        .bind(actor.id)
        .bind(&actor.login)
        .execute(&mut **tx)
        .await
        .context("insert actor failed")?;
    }
    Ok(())
}
