use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::api::models::{ExecutionDetailResponse, ExecutionResponse};
use crate::pool::model::{PoolAccount, RoleRequirements};
use crate::pool::{
    AccountUpdate, AccountsRepo, DeleteAccount, DeleteExecution, ExecutionStats, ExecutionsRepo,
    LeaseCoordinator, NewAccount, PoolError, PoolStatus, RoleAvailability,
};

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: LeaseCoordinator,
    pub accounts: AccountsRepo,
    pub executions: ExecutionsRepo,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Leasing
        .route("/pool/acquire", post(acquire))
        .route("/pool/release", post(release))
        .route("/pool/availability", get(availability))
        .route("/pool/availability/detailed", get(availability_detailed))
        .route("/pool/status", get(pool_status))
        // Account directory
        .route("/accounts", get(list_accounts).post(create_account))
        .route(
            "/accounts/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
        // Execution directory
        .route("/executions", get(list_executions))
        .route("/executions/stats/summary", get(execution_stats))
        .route("/executions/:id", get(get_execution).delete(delete_execution))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn err_body(status: StatusCode, error: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": error.to_string() })))
}

fn internal_err(e: sqlx::Error) -> ApiError {
    err_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {e}"),
    )
}

fn pool_err(e: PoolError) -> ApiError {
    match &e {
        PoolError::DuplicateExecution { .. } => err_body(StatusCode::CONFLICT, &e),
        PoolError::AcquisitionTimedOut {
            role,
            required,
            available,
            ..
        } => (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "error": e.to_string(),
                "role": role,
                "required": required,
                "available": available,
            })),
        ),
        PoolError::InvalidRequirements(_) => err_body(StatusCode::BAD_REQUEST, &e),
        PoolError::StoreUnavailable(_) => err_body(StatusCode::SERVICE_UNAVAILABLE, &e),
    }
}

// ----------------------------
// Leasing
// ----------------------------

#[derive(Debug, Deserialize)]
pub struct AcquireRequest {
    pub execution_id: String,
    pub requirements: RoleRequirements,
    pub max_retries: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct AcquireResponse {
    pub execution_id: String,
    pub accounts: Vec<PoolAccount>,
    pub acquired_at: DateTime<Utc>,
    pub status: String,
}

pub async fn acquire(
    State(state): State<ApiState>,
    Json(body): Json<AcquireRequest>,
) -> Result<Json<AcquireResponse>, ApiError> {
    let accounts = state
        .coordinator
        .acquire(&body.execution_id, &body.requirements, body.max_retries)
        .await
        .map_err(pool_err)?;

    Ok(Json(AcquireResponse {
        execution_id: body.execution_id,
        accounts,
        acquired_at: Utc::now(),
        status: "running".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub execution_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub execution_id: String,
    pub released_count: u64,
    pub released_at: DateTime<Utc>,
}

pub async fn release(
    State(state): State<ApiState>,
    Json(body): Json<ReleaseRequest>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let released_count = state
        .coordinator
        .release(&body.execution_id)
        .await
        .map_err(pool_err)?;

    Ok(Json(ReleaseResponse {
        execution_id: body.execution_id,
        released_count,
        released_at: Utc::now(),
    }))
}

pub async fn availability(
    State(state): State<ApiState>,
) -> Result<Json<HashMap<String, i64>>, ApiError> {
    let counts = state.coordinator.availability().await.map_err(pool_err)?;
    Ok(Json(counts))
}

pub async fn availability_detailed(
    State(state): State<ApiState>,
) -> Result<Json<Vec<RoleAvailability>>, ApiError> {
    let rows = state
        .accounts
        .availability_detailed()
        .await
        .map_err(internal_err)?;
    Ok(Json(rows))
}

pub async fn pool_status(State(state): State<ApiState>) -> Result<Json<PoolStatus>, ApiError> {
    let status = state.accounts.status().await.map_err(internal_err)?;
    Ok(Json(status))
}

// ----------------------------
// Account directory
// ----------------------------

#[derive(Debug, Deserialize)]
pub struct ListAccountsQuery {
    pub role: Option<String>,
    pub is_leased: Option<bool>,
    pub is_healthy: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_accounts(
    State(state): State<ApiState>,
    Query(q): Query<ListAccountsQuery>,
) -> Result<Json<Vec<PoolAccount>>, ApiError> {
    let rows = state
        .accounts
        .list(
            q.role.as_deref(),
            q.is_leased,
            q.is_healthy,
            q.limit.unwrap_or(100),
            q.offset.unwrap_or(0),
        )
        .await
        .map_err(internal_err)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub tenant: Option<String>,
    pub domain: Option<String>,
    pub tags: Option<String>,
}

pub async fn create_account(
    State(state): State<ApiState>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<PoolAccount>), ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() || body.role.trim().is_empty() {
        return Err(err_body(
            StatusCode::BAD_REQUEST,
            "email, password and role are required",
        ));
    }

    let created = state
        .accounts
        .create(NewAccount {
            email: body.email,
            password: body.password,
            role: body.role,
            tenant: body.tenant,
            domain: body.domain,
            tags: body.tags,
        })
        .await
        .map_err(|e| match e.as_database_error().map(|db| db.kind()) {
            Some(sqlx::error::ErrorKind::UniqueViolation) => {
                err_body(StatusCode::CONFLICT, "account email already exists")
            }
            _ => internal_err(e),
        })?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_account(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<PoolAccount>, ApiError> {
    match state.accounts.get(id).await.map_err(internal_err)? {
        Some(account) => Ok(Json(account)),
        None => Err(err_body(
            StatusCode::NOT_FOUND,
            format!("account {id} not found"),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub tenant: Option<String>,
    pub domain: Option<String>,
    pub tags: Option<String>,
    pub is_healthy: Option<bool>,
}

pub async fn update_account(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<PoolAccount>, ApiError> {
    let updated = state
        .accounts
        .update(
            id,
            AccountUpdate {
                email: body.email,
                password: body.password,
                role: body.role,
                tenant: body.tenant,
                domain: body.domain,
                tags: body.tags,
                is_healthy: body.is_healthy,
            },
        )
        .await
        .map_err(internal_err)?;

    match updated {
        Some(account) => Ok(Json(account)),
        None => Err(err_body(
            StatusCode::NOT_FOUND,
            format!("account {id} not found"),
        )),
    }
}

pub async fn delete_account(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    match state.accounts.delete(id).await.map_err(internal_err)? {
        DeleteAccount::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteAccount::NotFound => Err(err_body(
            StatusCode::NOT_FOUND,
            format!("account {id} not found"),
        )),
        DeleteAccount::StillLeased { leased_by } => Err(err_body(
            StatusCode::CONFLICT,
            format!("cannot delete account {id}: currently leased by {leased_by}"),
        )),
    }
}

// ----------------------------
// Execution directory
// ----------------------------

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_executions(
    State(state): State<ApiState>,
    Query(q): Query<ListExecutionsQuery>,
) -> Result<Json<Vec<ExecutionResponse>>, ApiError> {
    let rows = state
        .executions
        .list(q.status.as_deref(), q.limit.unwrap_or(100), q.offset.unwrap_or(0))
        .await
        .map_err(internal_err)?;

    Ok(Json(rows.into_iter().map(ExecutionResponse::from).collect()))
}

pub async fn get_execution(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionDetailResponse>, ApiError> {
    let execution = state
        .executions
        .get(&id)
        .await
        .map_err(internal_err)?
        .ok_or_else(|| err_body(StatusCode::NOT_FOUND, format!("execution {id} not found")))?;

    let assigned = state
        .executions
        .assigned_accounts(&id)
        .await
        .map_err(internal_err)?;

    Ok(Json(ExecutionDetailResponse::new(execution, assigned)))
}

pub async fn execution_stats(
    State(state): State<ApiState>,
) -> Result<Json<ExecutionStats>, ApiError> {
    let stats = state
        .executions
        .stats_summary()
        .await
        .map_err(internal_err)?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct DeleteExecutionQuery {
    pub force: Option<bool>,
}

pub async fn delete_execution(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(q): Query<DeleteExecutionQuery>,
) -> Result<StatusCode, ApiError> {
    let force = q.force.unwrap_or(false);

    match state
        .executions
        .delete(&id, force)
        .await
        .map_err(internal_err)?
    {
        DeleteExecution::Deleted { .. } => Ok(StatusCode::NO_CONTENT),
        DeleteExecution::NotFound => Err(err_body(
            StatusCode::NOT_FOUND,
            format!("execution {id} not found"),
        )),
        DeleteExecution::StillLeased { count } => Err(err_body(
            StatusCode::CONFLICT,
            format!("cannot delete execution {id}: {count} account(s) still leased; use force=true to release them"),
        )),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
