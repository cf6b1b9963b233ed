// crates/accountpool/src/pool/coordinator.rs

use crate::pool::error::{is_unique_violation, PoolError, Shortage};
use crate::pool::model::{ExecutionStatus, PoolAccount, RoleRequirements};
use crate::pool::retry::{backoff_delay, BackoffConfig};
use crate::pool::selector::Selector;
use crate::pool::store::DirectoryStore;
use chrono::Utc;
use rand::{rngs::StdRng, SeedableRng};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Retry ceiling accepted from callers.
pub const MAX_RETRIES_LIMIT: i32 = 50;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub default_max_retries: i32,
    pub backoff: BackoffConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 10,
            backoff: BackoffConfig::default(),
        }
    }
}

/// One pass of the acquisition loop: either every role was fully claimed
/// and the transaction committed, or some role came up short and the
/// transaction was rolled back.
pub enum AttemptOutcome {
    Granted(Vec<PoolAccount>),
    Short(Shortage),
}

/// Drives a multi-role acquisition to completion against the store.
///
/// Stateless per request: all coordination flows through row locks taken
/// by the store's claim query, so any number of coordinator clones (or
/// processes) can run concurrently.
#[derive(Clone)]
pub struct LeaseCoordinator {
    store: DirectoryStore,
    selector: Selector,
    cfg: CoordinatorConfig,
}

impl LeaseCoordinator {
    pub fn new(store: DirectoryStore, selector: Selector, cfg: CoordinatorConfig) -> Self {
        Self {
            store,
            selector,
            cfg,
        }
    }

    pub fn from_pool(pool: PgPool, cfg: CoordinatorConfig) -> Self {
        let store = DirectoryStore::new(pool);
        let selector = Selector::new(store.clone());
        Self::new(store, selector, cfg)
    }

    /// Acquire accounts satisfying `requirements` for a new execution.
    ///
    /// Creates the execution record (a reused id is a hard error), then
    /// attempts the full multi-role claim up to `max_retries` times with
    /// jittered exponential backoff between attempts. Success transitions
    /// the execution to RUNNING and returns the leased accounts; exhausted
    /// retries transition it to FAILED.
    pub async fn acquire(
        &self,
        execution_id: &str,
        requirements: &RoleRequirements,
        max_retries: Option<i32>,
    ) -> Result<Vec<PoolAccount>, PoolError> {
        validate_request(execution_id, requirements)?;

        let max_retries = max_retries
            .unwrap_or(self.cfg.default_max_retries)
            .clamp(1, MAX_RETRIES_LIMIT);

        self.create_execution(execution_id, requirements).await?;

        let mut rng = StdRng::from_entropy();
        let mut last_shortage: Option<Shortage> = None;
        let mut last_store_err: Option<sqlx::Error> = None;

        for attempt in 0..max_retries {
            match self.attempt_acquisition(execution_id, requirements).await {
                Ok(AttemptOutcome::Granted(accounts)) => {
                    // The claim is committed; the accounts are the caller's
                    // even if this bookkeeping transition fails.
                    if let Err(e) = self
                        .transition(execution_id, ExecutionStatus::Running)
                        .await
                    {
                        warn!(
                            execution_id,
                            error = %e,
                            "acquired accounts but failed to mark execution running"
                        );
                    }

                    info!(
                        execution_id,
                        accounts = accounts.len(),
                        attempts = attempt + 1,
                        "lease granted"
                    );
                    return Ok(accounts);
                }
                Ok(AttemptOutcome::Short(shortage)) => {
                    debug!(
                        execution_id,
                        role = %shortage.role,
                        required = shortage.required,
                        observed = shortage.observed,
                        attempt,
                        "attempt fell short"
                    );
                    last_shortage = Some(shortage);
                }
                Err(e) => {
                    warn!(execution_id, error = %e, attempt, "attempt failed at the store");
                    last_store_err = Some(e);
                }
            }

            if attempt + 1 < max_retries {
                let delay = backoff_delay(attempt as u32, &self.cfg.backoff, &mut rng);
                tokio::time::sleep(delay).await;
            }
        }

        if let Err(e) = self.transition(execution_id, ExecutionStatus::Failed).await {
            warn!(execution_id, error = %e, "failed to mark exhausted execution failed");
        }

        match last_shortage {
            Some(s) => Err(PoolError::AcquisitionTimedOut {
                role: s.role,
                required: s.required,
                available: s.observed,
                attempts: max_retries,
            }),
            // Every attempt died at the store without ever observing a
            // shortage; there are no shortage details to report.
            None => Err(match last_store_err {
                Some(e) => PoolError::StoreUnavailable(e),
                None => PoolError::StoreUnavailable(sqlx::Error::PoolClosed),
            }),
        }
    }

    /// Release every account held by `execution_id` and close out the
    /// execution record. Unknown ids and repeated calls return 0.
    pub async fn release(&self, execution_id: &str) -> Result<u64, PoolError> {
        let mut tx = self.store.begin().await?;

        let released = self.selector.release(&mut tx, execution_id).await?;

        if let Some(execution) = self.store.get_execution(&mut tx, execution_id).await? {
            // RUNNING -> COMPLETED is the normal path; a release racing the
            // acquire loop (still ACQUIRING) also completes the execution.
            // COMPLETED and FAILED are terminal and stay as they are.
            if !execution.status().is_terminal() {
                self.store
                    .update_execution_status(
                        &mut tx,
                        execution_id,
                        ExecutionStatus::Completed,
                        Utc::now(),
                    )
                    .await?;
            }
        }

        tx.commit().await?;

        info!(execution_id, released, "lease released");
        Ok(released)
    }

    /// Advisory availability snapshot per role.
    pub async fn availability(&self) -> Result<HashMap<String, i64>, PoolError> {
        Ok(self.selector.availability().await?)
    }

    async fn create_execution(
        &self,
        execution_id: &str,
        requirements: &RoleRequirements,
    ) -> Result<(), PoolError> {
        let mut tx = self.store.begin().await?;

        match self
            .store
            .create_execution(&mut tx, execution_id, requirements)
            .await
        {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(PoolError::DuplicateExecution {
                id: execution_id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// One all-or-nothing pass over the requirements. Commits only when
    /// every role was fully satisfied; any shortage rolls the transaction
    /// back so the rows claimed for earlier roles become free again before
    /// the backoff sleep. Holding them across the sleep would deadlock two
    /// callers that cross-need each other's roles.
    async fn attempt_acquisition(
        &self,
        execution_id: &str,
        requirements: &RoleRequirements,
    ) -> Result<AttemptOutcome, sqlx::Error> {
        let mut tx = self.store.begin().await?;
        let now = Utc::now();
        let mut granted = Vec::new();

        for (role, &count) in requirements {
            let accounts = self
                .selector
                .try_claim(&mut tx, role, count, execution_id, now)
                .await?;

            if (accounts.len() as i32) < count {
                let observed = accounts.len() as i32;
                tx.rollback().await?;
                return Ok(AttemptOutcome::Short(Shortage {
                    role: role.clone(),
                    required: count,
                    observed,
                }));
            }

            granted.extend(accounts);
        }

        tx.commit().await?;
        Ok(AttemptOutcome::Granted(granted))
    }

    /// State transitions run in their own small transaction so a failure
    /// here cannot corrupt lease ownership committed elsewhere.
    async fn transition(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.store.begin().await?;
        self.store
            .update_execution_status(&mut tx, execution_id, status, Utc::now())
            .await?;
        tx.commit().await
    }
}

fn validate_request(
    execution_id: &str,
    requirements: &RoleRequirements,
) -> Result<(), PoolError> {
    if execution_id.is_empty() || execution_id.len() > 255 {
        return Err(PoolError::InvalidRequirements(
            "execution id must be 1..=255 characters".into(),
        ));
    }
    if requirements.is_empty() {
        return Err(PoolError::InvalidRequirements(
            "requirements must name at least one role".into(),
        ));
    }
    for (role, &count) in requirements {
        if role.is_empty() {
            return Err(PoolError::InvalidRequirements("empty role name".into()));
        }
        if count < 1 {
            return Err(PoolError::InvalidRequirements(format!(
                "role '{role}' requires a count >= 1, got {count}"
            )));
        }
    }
    Ok(())
}
