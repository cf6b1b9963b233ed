// crates/accountpool/src/pool/accounts.rs

use crate::pool::model::PoolAccount;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub role: String,
    pub tenant: Option<String>,
    pub domain: Option<String>,
    pub tags: Option<String>,
}

/// Partial update; None leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub tenant: Option<String>,
    pub domain: Option<String>,
    pub tags: Option<String>,
    pub is_healthy: Option<bool>,
}

#[derive(Debug)]
pub enum DeleteAccount {
    Deleted,
    NotFound,
    /// Deleting a leased account would strand its execution's bookkeeping.
    StillLeased {
        leased_by: String,
    },
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct RoleAvailability {
    pub role: String,
    pub total_count: i64,
    pub leased_count: i64,
    pub available_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total_accounts: i64,
    pub available_accounts: i64,
    pub leased_accounts: i64,
    pub unhealthy_accounts: i64,
    pub active_executions: i64,
    pub utilization_percent: f64,
}

/// Static CRUD over the account directory. Lease state is never written
/// here; that is the selector's territory, behind row locks.
#[derive(Clone)]
pub struct AccountsRepo {
    pool: PgPool,
}

impl AccountsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, account: NewAccount) -> Result<PoolAccount, sqlx::Error> {
        sqlx::query_as::<_, PoolAccount>(
            r#"
            INSERT INTO pool_accounts (email, password, role, tenant, domain, tags)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&account.email)
        .bind(&account.password)
        .bind(&account.role)
        .bind(&account.tenant)
        .bind(&account.domain)
        .bind(&account.tags)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<PoolAccount>, sqlx::Error> {
        sqlx::query_as::<_, PoolAccount>("SELECT * FROM pool_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List accounts with optional filters. `limit` is clamped to [1, 500].
    pub async fn list(
        &self,
        role: Option<&str>,
        is_leased: Option<bool>,
        is_healthy: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PoolAccount>, sqlx::Error> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);

        sqlx::query_as::<_, PoolAccount>(
            r#"
            SELECT *
            FROM pool_accounts
            WHERE ($1::text IS NULL OR role = $1)
              AND ($2::bool IS NULL OR is_leased = $2)
              AND ($3::bool IS NULL OR is_healthy = $3)
            ORDER BY id ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(role)
        .bind(is_leased)
        .bind(is_healthy)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn update(
        &self,
        id: i64,
        update: AccountUpdate,
    ) -> Result<Option<PoolAccount>, sqlx::Error> {
        sqlx::query_as::<_, PoolAccount>(
            r#"
            UPDATE pool_accounts
            SET email = COALESCE($2, email),
                password = COALESCE($3, password),
                role = COALESCE($4, role),
                tenant = COALESCE($5, tenant),
                domain = COALESCE($6, domain),
                tags = COALESCE($7, tags),
                is_healthy = COALESCE($8, is_healthy),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(update.email)
        .bind(update.password)
        .bind(update.role)
        .bind(update.tenant)
        .bind(update.domain)
        .bind(update.tags)
        .bind(update.is_healthy)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn delete(&self, id: i64) -> Result<DeleteAccount, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(bool, Option<String>)> = sqlx::query_as(
            "SELECT is_leased, leased_by FROM pool_accounts WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match row {
            None => DeleteAccount::NotFound,
            Some((true, leased_by)) => DeleteAccount::StillLeased {
                leased_by: leased_by.unwrap_or_default(),
            },
            Some((false, _)) => {
                sqlx::query("DELETE FROM pool_accounts WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                DeleteAccount::Deleted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Per-role totals over healthy accounts.
    pub async fn availability_detailed(&self) -> Result<Vec<RoleAvailability>, sqlx::Error> {
        sqlx::query_as::<_, RoleAvailability>(
            r#"
            SELECT role,
                   COUNT(*) AS total_count,
                   COUNT(*) FILTER (WHERE is_leased) AS leased_count,
                   COUNT(*) FILTER (WHERE NOT is_leased) AS available_count
            FROM pool_accounts
            WHERE is_healthy = true
            GROUP BY role
            ORDER BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn status(&self) -> Result<PoolStatus, sqlx::Error> {
        let (total, available, leased, unhealthy): (i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE NOT is_leased AND is_healthy),
                   COUNT(*) FILTER (WHERE is_leased),
                   COUNT(*) FILTER (WHERE NOT is_healthy)
            FROM pool_accounts
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let active_executions: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM executions WHERE status IN ('acquiring', 'running')",
        )
        .fetch_one(&self.pool)
        .await?;

        let utilization_percent = if total > 0 {
            (leased as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        Ok(PoolStatus {
            total_accounts: total,
            available_accounts: available,
            leased_accounts: leased,
            unhealthy_accounts: unhealthy,
            active_executions,
            utilization_percent,
        })
    }
}
