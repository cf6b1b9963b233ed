// crates/accountpool/src/pool/store.rs

use crate::pool::model::{Execution, ExecutionStatus, PoolAccount, RoleRequirements};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

/// Transactional access to the two durable collections, `pool_accounts`
/// and `executions`. Everything that mutates lease state goes through a
/// caller-owned transaction so multi-role claims commit or roll back as
/// one unit.
#[derive(Clone)]
pub struct DirectoryStore {
    pool: PgPool,
}

impl DirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    // ----------------------------
    // Grant primitive
    // ----------------------------

    /// Select up to `count` available account ids for `role` and lock the
    /// rows, skipping rows already locked by concurrent claimers.
    ///
    /// Correctness: SELECT ... FOR UPDATE SKIP LOCKED
    ///
    /// Ordering is the fairness key: never-leased accounts first
    /// (leased_at IS NULL), then least-recently-leased.
    pub async fn claim_candidates(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        role: &str,
        count: i32,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id
            FROM pool_accounts
            WHERE role = $1
              AND is_leased = false
              AND is_healthy = true
            ORDER BY leased_at ASC NULLS FIRST
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(role)
        .bind(count as i64)
        .fetch_all(&mut **tx)
        .await?;

        Ok(ids)
    }

    /// Mark previously claimed rows as leased by `execution_id`. Must run
    /// in the same transaction as [`claim_candidates`]: the row locks are
    /// what keeps concurrent claimers off these ids until commit.
    pub async fn mark_leased(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        ids: &[i64],
        execution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PoolAccount>, sqlx::Error> {
        let accounts = sqlx::query_as::<_, PoolAccount>(
            r#"
            UPDATE pool_accounts
            SET is_leased = true,
                leased_by = $2,
                leased_at = $3,
                updated_at = now()
            WHERE id = ANY($1)
            RETURNING *
            "#,
        )
        .bind(ids)
        .bind(execution_id)
        .bind(now)
        .fetch_all(&mut **tx)
        .await?;

        Ok(accounts)
    }

    /// Clear all three lease fields for every row held by `execution_id`.
    /// Returns rows affected; 0 when the execution holds nothing.
    pub async fn release_by_execution(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        execution_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let res = sqlx::query(
            r#"
            UPDATE pool_accounts
            SET is_leased = false,
                leased_by = NULL,
                leased_at = NULL,
                updated_at = now()
            WHERE leased_by = $1
            "#,
        )
        .bind(execution_id)
        .execute(&mut **tx)
        .await?;

        Ok(res.rows_affected())
    }

    // ----------------------------
    // Executions
    // ----------------------------

    /// Insert a new execution row in ACQUIRING. A primary-key collision
    /// surfaces as a database unique violation; the caller decides what
    /// that means.
    pub async fn create_execution(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: &str,
        requested_roles: &RoleRequirements,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO executions (id, requested_roles, status)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(sqlx::types::Json(requested_roles))
        .bind(ExecutionStatus::Acquiring.as_str())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    pub async fn get_execution(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: &str,
    ) -> Result<Option<Execution>, sqlx::Error> {
        sqlx::query_as::<_, Execution>("SELECT * FROM executions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Transition an execution and stamp the matching timestamp column:
    /// RUNNING sets acquired_at, COMPLETED/FAILED set completed_at.
    pub async fn update_execution_status(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        id: &str,
        status: ExecutionStatus,
        ts: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let query = match status {
            ExecutionStatus::Running => {
                sqlx::query("UPDATE executions SET status = $2, acquired_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .bind(ts)
            }
            ExecutionStatus::Completed | ExecutionStatus::Failed => {
                sqlx::query("UPDATE executions SET status = $2, completed_at = $3 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
                    .bind(ts)
            }
            ExecutionStatus::Acquiring => {
                sqlx::query("UPDATE executions SET status = $2 WHERE id = $1")
                    .bind(id)
                    .bind(status.as_str())
            }
        };

        query.execute(&mut **tx).await?;

        Ok(())
    }

    // ----------------------------
    // Snapshots
    // ----------------------------

    /// Count of available (unleased, healthy) accounts per role. Advisory
    /// only: the snapshot can be stale the moment it returns.
    pub async fn availability_by_role(&self) -> Result<HashMap<String, i64>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT role, COUNT(*)
            FROM pool_accounts
            WHERE is_leased = false
              AND is_healthy = true
            GROUP BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
