// crates/accountpool/src/pool/executions.rs

use crate::pool::model::{Execution, PoolAccount};
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug)]
pub enum DeleteExecution {
    Deleted { released: u64 },
    NotFound,
    StillLeased { count: i64 },
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExecutionStatusStats {
    pub status: String,
    pub count: i64,
    /// Mean acquired_at to completed_at gap; None until some execution in
    /// this status has both timestamps.
    pub avg_duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    pub by_status: Vec<ExecutionStatusStats>,
    pub total: i64,
}

/// Read/delete access to the execution directory for the admin surface.
/// Creation and state transitions belong to the coordinator.
#[derive(Clone)]
pub struct ExecutionsRepo {
    pool: PgPool,
}

impl ExecutionsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Execution>, sqlx::Error> {
        sqlx::query_as::<_, Execution>("SELECT * FROM executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(
        &self,
        status: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Execution>, sqlx::Error> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);

        sqlx::query_as::<_, Execution>(
            r#"
            SELECT *
            FROM executions
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    /// Accounts currently leased by this execution.
    pub async fn assigned_accounts(&self, id: &str) -> Result<Vec<PoolAccount>, sqlx::Error> {
        sqlx::query_as::<_, PoolAccount>(
            "SELECT * FROM pool_accounts WHERE leased_by = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
    }

    /// Counts by status plus the average run duration where both
    /// timestamps exist.
    pub async fn stats_summary(&self) -> Result<ExecutionStats, sqlx::Error> {
        let by_status = sqlx::query_as::<_, ExecutionStatusStats>(
            r#"
            SELECT status,
                   COUNT(*) AS count,
                   AVG(EXTRACT(EPOCH FROM completed_at - acquired_at))::float8
                       AS avg_duration_seconds
            FROM executions
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let total = by_status.iter().map(|s| s.count).sum();

        Ok(ExecutionStats { by_status, total })
    }

    /// Delete an execution record. Refused while it still holds accounts
    /// unless `force`, which releases them first.
    pub async fn delete(&self, id: &str, force: bool) -> Result<DeleteExecution, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM executions WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if exists.is_none() {
            tx.commit().await?;
            return Ok(DeleteExecution::NotFound);
        }

        let leased: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pool_accounts WHERE leased_by = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        if leased > 0 && !force {
            tx.rollback().await?;
            return Ok(DeleteExecution::StillLeased { count: leased });
        }

        let released = if leased > 0 {
            sqlx::query(
                r#"
                UPDATE pool_accounts
                SET is_leased = false,
                    leased_by = NULL,
                    leased_at = NULL,
                    updated_at = now()
                WHERE leased_by = $1
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
        } else {
            0
        };

        sqlx::query("DELETE FROM executions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(DeleteExecution::Deleted { released })
    }
}
