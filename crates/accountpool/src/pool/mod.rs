pub mod coordinator;
pub mod error;
pub mod model;
pub mod retry;
pub mod selector;
pub mod store;

pub mod accounts;
pub use accounts::{
    AccountUpdate, AccountsRepo, DeleteAccount, NewAccount, PoolStatus, RoleAvailability,
};

pub mod executions;
pub use executions::{DeleteExecution, ExecutionStats, ExecutionStatusStats, ExecutionsRepo};

pub use coordinator::{AttemptOutcome, CoordinatorConfig, LeaseCoordinator, MAX_RETRIES_LIMIT};
pub use error::{PoolError, Shortage};
pub use model::{Execution, ExecutionStatus, PoolAccount, RoleRequirements};
pub use retry::BackoffConfig;
pub use selector::Selector;
pub use store::DirectoryStore;
