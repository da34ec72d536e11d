//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        multipart::{Multipart, MultipartRejection},
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::app::AppState;
use crate::domain::{
    AppError, CallerIdentity, CreateUserRequest, DatabaseError, DeleteItemResponse, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, Item, ItemFilter, SetSoldRequest, StorageError,
    User, ValidationError,
};

use super::multipart::read_item_submission;

fn malformed(message: String) -> AppError {
    ValidationError::MalformedRequest(message).into()
}

/// List items, newest first
pub async fn list_items_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ItemFilter>, QueryRejection>,
) -> Result<Json<Vec<Item>>, AppError> {
    let Query(filter) = query.map_err(|e| malformed(e.body_text()))?;
    let items = state.service.list_items(&filter).await?;
    Ok(Json(items))
}

/// Get a single item by ID
pub async fn get_item_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, AppError> {
    let item = state
        .service
        .get_item(&id)
        .await?
        .ok_or(AppError::Database(DatabaseError::NotFound(id)))?;
    Ok(Json(item))
}

/// Create a new item from a multipart form
pub async fn create_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Item>), AppError> {
    let multipart = multipart.map_err(|e| malformed(e.body_text()))?;
    let submission = read_item_submission(multipart).await?;
    let item = state.service.submit_item(&caller, submission).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Mark an item as sold or available again
pub async fn set_item_sold_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
    payload: Result<Json<SetSoldRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let Json(payload) = payload.map_err(|e| malformed(e.body_text()))?;
    let item = state
        .service
        .set_item_sold(&caller, &id, payload.sold)
        .await?;
    Ok(Json(item))
}

/// Delete an item owned by the caller
pub async fn delete_item_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<Json<DeleteItemResponse>, AppError> {
    let response = state.service.delete_item(&caller, &id).await?;
    Ok(Json(response))
}

/// List registered users
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.service.list_users().await?;
    Ok(Json(users))
}

/// Get a user by uid
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .service
        .get_user(&uid)
        .await?
        .ok_or(AppError::Database(DatabaseError::NotFound(uid)))?;
    Ok(Json(user))
}

/// Register the caller's profile
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerIdentity>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let Json(payload) = payload.map_err(|e| malformed(e.body_text()))?;
    let user = state.service.register_user(&caller, &payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Detailed health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Status, error type, machine code and offending fields for an error.
fn classify(err: &AppError) -> (StatusCode, &'static str, Option<&'static str>, Vec<String>) {
    match err {
        AppError::Database(db_err) => match db_err {
            DatabaseError::Connection(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "database_error", None, Vec::new())
            }
            DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None, Vec::new()),
            DatabaseError::Duplicate(_) => (StatusCode::CONFLICT, "duplicate", None, Vec::new()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None, Vec::new()),
        },
        AppError::Storage(storage_err) => match storage_err {
            StorageError::Connection(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_error", None, Vec::new())
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None, Vec::new()),
        },
        AppError::Config(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "configuration_error",
            None,
            Vec::new(),
        ),
        AppError::Validation(v) => (
            StatusCode::BAD_REQUEST,
            "validation_error",
            Some(v.code()),
            v.fields(),
        ),
        AppError::Submission { source, .. } => classify(source),
        AppError::Authentication(_) => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            None,
            Vec::new(),
        ),
        AppError::Authorization(_) => {
            (StatusCode::FORBIDDEN, "authorization_error", None, Vec::new())
        }
        AppError::PayloadTooLarge(_) => (
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            Some("PAYLOAD_TOO_LARGE"),
            Vec::new(),
        ),
        AppError::Serialization(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "serialization_error",
            None,
            Vec::new(),
        ),
        AppError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            None,
            Vec::new(),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, fields) = classify(&self);
        let step = match &self {
            AppError::Submission { step, .. } => Some(step.as_str().to_string()),
            _ => None,
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(error_type = %error_type, step = ?step, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.map(str::to_string),
                fields,
                step,
                ..ErrorDetail::new(error_type, message)
            },
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
