// crates/accountpool/src/pool/selector.rs

use crate::pool::model::PoolAccount;
use crate::pool::store::DirectoryStore;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;

/// Pure allocation logic over the store: claim N accounts of a role for an
/// execution, release an execution's accounts, report availability. Does
/// no waiting and no retrying; that is the coordinator's job.
#[derive(Clone)]
pub struct Selector {
    store: DirectoryStore,
}

impl Selector {
    pub fn new(store: DirectoryStore) -> Self {
        Self { store }
    }

    /// Claim up to `count` available accounts of `role` and mark them
    /// leased by `execution_id`, all inside the caller's transaction.
    ///
    /// Returns the hydrated rows. Fewer than `count` means shortage: the
    /// caller must roll back the whole transaction, which also drops the
    /// row locks taken here.
    pub async fn try_claim(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        role: &str,
        count: i32,
        execution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PoolAccount>, sqlx::Error> {
        let ids = self.store.claim_candidates(tx, role, count).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.store.mark_leased(tx, &ids, execution_id, now).await
    }

    /// Unlease everything held by `execution_id`. Returns the row count;
    /// calling again for the same execution yields 0.
    pub async fn release(
        &self,
        tx: &mut Transaction<'static, Postgres>,
        execution_id: &str,
    ) -> Result<u64, sqlx::Error> {
        self.store.release_by_execution(tx, execution_id).await
    }

    /// Snapshot of available accounts per role; may be stale immediately.
    pub async fn availability(&self) -> Result<HashMap<String, i64>, sqlx::Error> {
        self.store.availability_by_role().await
    }
}
