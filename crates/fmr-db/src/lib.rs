//! fmr-db
//!
//! Typed read/write access to the mirror database. All multi-statement writes
//! (emitting or deleting a synthetic event) are single transactions; any SQL
//! error propagates up and aborts the whole run, because a partially written
//! event is worse than a crashed process.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fmr_reconcile::{Candidate, MirrorSnapshot, SYNTHETIC_EVENT_BASE};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

mod synthetic;

pub use synthetic::{EmitOutcome, ARTIFICIAL_EVENT_TYPE};

/// Connection override used by integration tests.
pub const ENV_DB_URL: &str = "FMR_DATABASE_URL";

/// Gateway handle shared by every task in a run.
#[derive(Clone)]
pub struct Mirror {
    pool: PgPool,
    /// Dry run: writes are logged and skipped, reads proceed.
    skip_persist: bool,
}

/// A non-synthetic snapshot adjacent to a synthetic event, as consulted by
/// the janitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighbourSnapshot {
    pub event_id: i64,
    pub milestone_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// One synthetic `issues` row in the janitor's working set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtificialRow {
    pub issue_id: i64,
    pub event_id: i64,
    pub milestone_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct DbStatus {
    pub ok: bool,
    pub has_events_table: bool,
}

impl Mirror {
    /// Connect to the mirror.
    pub async fn connect(dsn: &str, skip_persist: bool) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(dsn)
            .await
            .context("failed to connect to the mirror database")?;
        Ok(Self { pool, skip_persist })
    }

    /// Test helper: connect using `FMR_DATABASE_URL` and ensure the schema is
    /// applied.
    pub async fn testkit_connect() -> Result<Self> {
        let dsn =
            std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
        let mirror = Self::connect(&dsn, false).await?;
        mirror.migrate().await?;
        Ok(mirror)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn skip_persist(&self) -> bool {
        self.skip_persist
    }

    /// Apply the embedded mirror schema (idempotent).
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("mirror migrate failed")?;
        Ok(())
    }

    /// Connectivity and schema-presence probe.
    pub async fn status(&self) -> Result<DbStatus> {
        let (one,): (i32,) = sqlx::query_as("select 1")
            .fetch_one(&self.pool)
            .await
            .context("status connectivity query failed")?;

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            select exists (
                select 1
                from information_schema.tables
                where table_schema='public' and table_name='events'
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("status table-exists query failed")?;

        Ok(DbStatus {
            ok: one == 1,
            has_events_table: exists,
        })
    }

    /// Default candidate set: run the externally supplied SQL template with
    /// the `{{period}}` literal substituted.
    pub async fn open_candidates(&self, template: &str, period: &str) -> Result<Vec<Candidate>> {
        let sql = template.replace("{{period}}", period);
        let rows: Vec<(String, i32, i64, bool)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .context("candidate template query failed")?;
        Ok(rows
            .into_iter()
            .map(|(repo, number, issue_id, is_pr)| Candidate::new(repo, number, issue_id, is_pr))
            .collect())
    }

    /// Debug candidate set: identical tuples for an explicit id list.
    pub async fn candidates_by_ids(&self, ids: &[i64]) -> Result<Vec<Candidate>> {
        let rows: Vec<(String, i32, i64, bool)> = sqlx::query_as(
            r#"
            select distinct repo_name, number, issue_id, is_pull_request
            from issues
            where issue_id = any($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("candidate id-list query failed")?;
        Ok(rows
            .into_iter()
            .map(|(repo, number, issue_id, is_pr)| Candidate::new(repo, number, issue_id, is_pr))
            .collect())
    }

    /// The mirror's latest snapshot of `issue_id` at `at`: greatest
    /// `(updated_at, event_id)` among rows not newer than `at`.
    pub async fn latest_snapshot(
        &self,
        issue_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Option<MirrorSnapshot>> {
        let row: Option<(Option<i64>, i64, Option<DateTime<Utc>>, String)> = sqlx::query_as(
            r#"
            select milestone_id, event_id, closed_at, state
            from issues
            where issue_id = $1 and updated_at <= $2
            order by updated_at desc, event_id desc
            limit 1
            "#,
        )
        .bind(issue_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .context("latest snapshot query failed")?;

        Ok(row.map(|(milestone_id, event_id, closed_at, state)| MirrorSnapshot {
            event_id,
            milestone_id,
            closed_at,
            state,
        }))
    }

    /// Canonical label-set string of one event: ascending label ids joined by
    /// commas, empty when the event carries no labels.
    pub async fn label_set(&self, event_id: i64) -> Result<String> {
        let (labels,): (String,) = sqlx::query_as(
            r#"
            select coalesce(string_agg(sub.label_id::text, ','), '')
            from (
                select label_id from issue_labels
                where event_id = $1
                order by label_id
            ) sub
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .context("label set query failed")?;
        Ok(labels)
    }

    /// Most recent non-synthetic snapshot strictly before `before`.
    pub async fn prior_snapshot(
        &self,
        issue_id: i64,
        before: DateTime<Utc>,
    ) -> Result<Option<NeighbourSnapshot>> {
        let row: Option<(i64, Option<i64>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select event_id, milestone_id, updated_at
            from issues
            where issue_id = $1 and updated_at < $2 and event_id < $3
            order by updated_at desc, event_id desc
            limit 1
            "#,
        )
        .bind(issue_id)
        .bind(before)
        .bind(SYNTHETIC_EVENT_BASE)
        .fetch_optional(&self.pool)
        .await
        .context("prior snapshot query failed")?;
        Ok(row.map(|(event_id, milestone_id, updated_at)| NeighbourSnapshot {
            event_id,
            milestone_id,
            updated_at,
        }))
    }

    /// Earliest non-synthetic snapshot strictly after `after` and strictly
    /// before `until`.
    pub async fn next_snapshot_within(
        &self,
        issue_id: i64,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<NeighbourSnapshot>> {
        let row: Option<(i64, Option<i64>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select event_id, milestone_id, updated_at
            from issues
            where issue_id = $1 and updated_at > $2 and updated_at < $3 and event_id < $4
            order by updated_at asc, event_id asc
            limit 1
            "#,
        )
        .bind(issue_id)
        .bind(after)
        .bind(until)
        .bind(SYNTHETIC_EVENT_BASE)
        .fetch_optional(&self.pool)
        .await
        .context("next snapshot query failed")?;
        Ok(row.map(|(event_id, milestone_id, updated_at)| NeighbourSnapshot {
            event_id,
            milestone_id,
            updated_at,
        }))
    }

    /// All synthetic rows touched inside the recent window.
    pub async fn artificial_rows_recent(&self, range: &str) -> Result<Vec<ArtificialRow>> {
        let rows: Vec<(i64, i64, Option<i64>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select issue_id, event_id, milestone_id, updated_at
            from issues
            where event_id > $1 and updated_at > now() - $2::text::interval
            "#,
        )
        .bind(SYNTHETIC_EVENT_BASE)
        .bind(range)
        .fetch_all(&self.pool)
        .await
        .context("artificial rows query failed")?;
        Ok(rows.into_iter().map(artificial_row).collect())
    }

    /// Debug path: synthetic rows restricted to an explicit event-id list.
    pub async fn artificial_rows_by_ids(&self, event_ids: &[i64]) -> Result<Vec<ArtificialRow>> {
        let rows: Vec<(i64, i64, Option<i64>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            select issue_id, event_id, milestone_id, updated_at
            from issues
            where event_id > $1 and event_id = any($2)
            "#,
        )
        .bind(SYNTHETIC_EVENT_BASE)
        .bind(event_ids)
        .fetch_all(&self.pool)
        .await
        .context("artificial rows id-list query failed")?;
        Ok(rows.into_iter().map(artificial_row).collect())
    }

    /// Resolve `events.repo_id` from the candidate's repository name;
    /// 0 when the mirror has never seen the repository.
    pub async fn repo_id_by_name(&self, name: &str) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("select repo_id from repos where name = $1 limit 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("repo lookup failed")?;
        Ok(row.map(|(id,)| id).unwrap_or(0))
    }

    /// Remove a synthetic event from all four relations in one transaction.
    pub async fn delete_synthetic(&self, event_id: i64) -> Result<()> {
        if self.skip_persist {
            debug!("skipping delete of artificial event {event_id}");
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin delete transaction")?;

        sqlx::query("delete from events where event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("delete from events failed")?;
        sqlx::query("delete from issues where event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("delete from issues failed")?;
        sqlx::query("delete from payloads where event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("delete from payloads failed")?;
        sqlx::query("delete from issue_labels where event_id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .context("delete from issue_labels failed")?;

        tx.commit().await.context("commit delete transaction")?;
        Ok(())
    }
}

fn artificial_row(row: (i64, i64, Option<i64>, DateTime<Utc>)) -> ArtificialRow {
    let (issue_id, event_id, milestone_id, updated_at) = row;
    ArtificialRow {
        issue_id,
        event_id,
        milestone_id,
        updated_at,
    }
}
