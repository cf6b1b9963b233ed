use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

/// A pre-provisioned test account in the directory. Credentials (email,
/// password, tenant, domain, tags) are opaque to the coordinator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PoolAccount {
    pub id: i64,
    pub email: String,
    pub password: String,
    pub role: String,
    pub tenant: Option<String>,
    pub domain: Option<String>,
    pub tags: Option<String>,

    pub is_leased: bool,
    pub is_healthy: bool,
    pub leased_by: Option<String>,
    pub leased_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role -> required count. BTreeMap so attempts walk roles in a stable
/// order (which role gets reported on shortage is deterministic).
pub type RoleRequirements = BTreeMap<String, i32>;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Execution {
    pub id: String,
    pub requested_roles: sqlx::types::Json<RoleRequirements>,
    pub status: String,

    pub created_at: DateTime<Utc>,
    pub acquired_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn status(&self) -> ExecutionStatus {
        ExecutionStatus::from_str(&self.status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Acquiring,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Acquiring => "acquiring",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "running" => ExecutionStatus::Running,
            "completed" => ExecutionStatus::Completed,
            "failed" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Acquiring,
        }
    }

    /// RUNNING and the terminal states never go back to ACQUIRING;
    /// COMPLETED/FAILED never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}
