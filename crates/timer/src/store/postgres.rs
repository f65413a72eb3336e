//! PostgreSQL store backed by sqlx.
//!
//! Every timer transition is a single-row conditional
//! `UPDATE ... WHERE status = $expected ... RETURNING` statement, so the
//! database is the arbiter of the status graph and concurrent writers
//! cannot interleave a read-branch-write. Schema lives in
//! `crates/timer/migrations/`.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use casewatch_core::{ReferenceModule, SlaTarget, SlaTimer, TimerStatus, TriggerRules};

use super::{Result, StoreError, TargetStore, TimerStore};

/// PostgreSQL implementation of [`TargetStore`] and [`TimerStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool against the given database URL.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Run a conditional timer update and map the returned row, if any.
    async fn conditional_update(
        &self,
        sql: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<SlaTimer>> {
        let row = sqlx::query(sql)
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| timer_from_row(&r)).transpose()
    }
}

// ── Row mapping ─────────────────────────────────────────────────────

fn target_from_row(row: &PgRow) -> Result<SlaTarget> {
    let module: String = row.try_get("reference_module")?;
    let rules: serde_json::Value = row.try_get("rules")?;
    let rules: TriggerRules =
        serde_json::from_value(rules).map_err(|e| StoreError::InvalidValue(e.to_string()))?;
    Ok(SlaTarget {
        id: row.try_get("id")?,
        key: row.try_get("key")?,
        name: row.try_get("name")?,
        goal_ms: row.try_get("goal_ms")?,
        reference_module: module
            .parse::<ReferenceModule>()
            .map_err(StoreError::InvalidValue)?,
        business_line_id: row.try_get("business_line_id")?,
        rules,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn timer_from_row(row: &PgRow) -> Result<SlaTimer> {
    let status: String = row.try_get("status")?;
    Ok(SlaTimer {
        id: row.try_get("id")?,
        entity_id: row.try_get("entity_id")?,
        target_id: row.try_get("target_id")?,
        target_key: row.try_get("target_key")?,
        goal_ms: row.try_get("goal_ms")?,
        status: status
            .parse::<TimerStatus>()
            .map_err(StoreError::InvalidValue)?,
        remaining_ms: row.try_get("remaining_ms")?,
        total_paused_ms: row.try_get("total_paused_ms")?,
        started_at: row.try_get("started_at")?,
        last_tick_at: row.try_get("last_tick_at")?,
        paused_at: row.try_get("paused_at")?,
        resumed_at: row.try_get("resumed_at")?,
        stopped_at: row.try_get("stopped_at")?,
        breached_at: row.try_get("breached_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ── TargetStore ─────────────────────────────────────────────────────

#[async_trait::async_trait]
impl TargetStore for PgStore {
    async fn insert(&self, target: SlaTarget) -> Result<SlaTarget> {
        let rules = serde_json::to_value(&target.rules)
            .map_err(|e| StoreError::InvalidValue(e.to_string()))?;
        let result = sqlx::query(
            r#"
            INSERT INTO sla_targets
                (id, key, name, goal_ms, reference_module, business_line_id, rules, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(target.id)
        .bind(&target.key)
        .bind(&target.name)
        .bind(target.goal_ms)
        .bind(target.reference_module.to_string())
        .bind(target.business_line_id)
        .bind(rules)
        .bind(target.is_active)
        .bind(target.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(target),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateTargetKey(target.key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<SlaTarget>> {
        let row = sqlx::query("SELECT * FROM sla_targets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| target_from_row(&r)).transpose()
    }

    async fn list(&self) -> Result<Vec<SlaTarget>> {
        let rows = sqlx::query("SELECT * FROM sla_targets ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(target_from_row).collect()
    }

    async fn list_active(
        &self,
        module: ReferenceModule,
        business_line_id: Option<Uuid>,
    ) -> Result<Vec<SlaTarget>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM sla_targets
            WHERE is_active
              AND reference_module = $1
              AND (business_line_id IS NULL OR business_line_id = $2)
            ORDER BY key
            "#,
        )
        .bind(module.to_string())
        .bind(business_line_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(target_from_row).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sla_targets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── TimerStore ──────────────────────────────────────────────────────

#[async_trait::async_trait]
impl TimerStore for PgStore {
    async fn insert(&self, timer: SlaTimer) -> Result<SlaTimer> {
        let result = sqlx::query(
            r#"
            INSERT INTO sla_timers
                (id, entity_id, target_id, target_key, goal_ms, status, remaining_ms,
                 total_paused_ms, started_at, last_tick_at, paused_at, resumed_at,
                 stopped_at, breached_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(timer.id)
        .bind(&timer.entity_id)
        .bind(timer.target_id)
        .bind(&timer.target_key)
        .bind(timer.goal_ms)
        .bind(timer.status.to_string())
        .bind(timer.remaining_ms)
        .bind(timer.total_paused_ms)
        .bind(timer.started_at)
        .bind(timer.last_tick_at)
        .bind(timer.paused_at)
        .bind(timer.resumed_at)
        .bind(timer.stopped_at)
        .bind(timer.breached_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(timer),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateTimer {
                entity_id: timer.entity_id,
                target_id: timer.target_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, entity_id: &str, target_id: Uuid) -> Result<Option<SlaTimer>> {
        let row = sqlx::query("SELECT * FROM sla_timers WHERE entity_id = $1 AND target_id = $2")
            .bind(entity_id)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| timer_from_row(&r)).transpose()
    }

    async fn list_for_entity(&self, entity_id: &str) -> Result<Vec<SlaTimer>> {
        let rows = sqlx::query("SELECT * FROM sla_timers WHERE entity_id = $1 ORDER BY target_key")
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(timer_from_row).collect()
    }

    async fn list_running(&self, limit: usize) -> Result<Vec<SlaTimer>> {
        let rows = sqlx::query(
            "SELECT * FROM sla_timers WHERE status = 'running' ORDER BY last_tick_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(timer_from_row).collect()
    }

    async fn mark_met(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        self.conditional_update(
            r#"
            UPDATE sla_timers SET status = 'met', stopped_at = $2
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
            id,
            at,
        )
        .await
    }

    async fn mark_paused(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        self.conditional_update(
            r#"
            UPDATE sla_timers SET status = 'paused', paused_at = $2
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
            id,
            at,
        )
        .await
    }

    async fn mark_resumed(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        self.conditional_update(
            r#"
            UPDATE sla_timers SET
                status = 'running',
                total_paused_ms = total_paused_ms
                    + GREATEST(0, (EXTRACT(EPOCH FROM ($2 - paused_at)) * 1000)::BIGINT),
                resumed_at = $2,
                last_tick_at = $2,
                paused_at = NULL
            WHERE id = $1 AND status = 'paused'
            RETURNING *
            "#,
            id,
            at,
        )
        .await
    }

    async fn mark_stopped(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        self.conditional_update(
            r#"
            UPDATE sla_timers SET status = 'stopped', stopped_at = $2
            WHERE id = $1 AND status IN ('running', 'paused')
            RETURNING *
            "#,
            id,
            at,
        )
        .await
    }

    async fn advance(
        &self,
        id: Uuid,
        expected_tick: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<SlaTimer>> {
        let row = sqlx::query(
            r#"
            UPDATE sla_timers SET
                remaining_ms = GREATEST(0, remaining_ms
                    - GREATEST(0, (EXTRACT(EPOCH FROM ($3 - last_tick_at)) * 1000)::BIGINT)),
                last_tick_at = $3
            WHERE id = $1 AND status = 'running' AND last_tick_at = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_tick)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| timer_from_row(&r)).transpose()
    }

    async fn mark_breached(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<SlaTimer>> {
        self.conditional_update(
            r#"
            UPDATE sla_timers SET status = 'breached', breached_at = $2, remaining_ms = 0
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
            id,
            at,
        )
        .await
    }
}
