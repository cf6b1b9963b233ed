// crates/accountpool/src/api/models.rs
use crate::pool::model::{Execution, PoolAccount, RoleRequirements};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub id: String,
    pub requested_roles: RoleRequirements,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Execution> for ExecutionResponse {
    fn from(e: Execution) -> Self {
        Self {
            id: e.id,
            requested_roles: e.requested_roles.0,
            status: e.status,
            created_at: e.created_at,
            acquired_at: e.acquired_at,
            completed_at: e.completed_at,
        }
    }
}

/// Execution plus the accounts it currently holds.
#[derive(Debug, Serialize)]
pub struct ExecutionDetailResponse {
    #[serde(flatten)]
    pub execution: ExecutionResponse,
    pub assigned_accounts: Vec<PoolAccount>,
    pub duration_seconds: Option<f64>,
}

impl ExecutionDetailResponse {
    pub fn new(execution: Execution, assigned_accounts: Vec<PoolAccount>) -> Self {
        let duration_seconds = match (execution.acquired_at, execution.completed_at) {
            (Some(a), Some(c)) => Some((c - a).num_milliseconds() as f64 / 1000.0),
            _ => None,
        };
        Self {
            execution: execution.into(),
            assigned_accounts,
            duration_seconds,
        }
    }
}
