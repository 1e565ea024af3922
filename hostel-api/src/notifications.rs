use axum::{
    extract::State,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use hostel_core::notification::Notification;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{error::AppError, extract::{AppPath, AppQuery}, middleware::AuthUser, state::AppState};

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    unread_only: bool,
}

fn not_found() -> AppError {
    AppError::NotFoundError("Notification not found".to_string())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", post(mark_all_read))
        .route("/api/notifications/{id}/read", patch(mark_read))
        .route("/api/notifications/{id}", delete(delete_notification))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let items = state
        .notifications
        .list(actor.id, query.unread_only)
        .await
        .map_err(hostel_core::CoreError::from)?;
    Ok(Json(items))
}

async fn mark_read(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .notifications
        .mark_read(id, actor.id)
        .await
        .map_err(hostel_core::CoreError::from)?;
    if !updated {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let updated = state
        .notifications
        .mark_all_read(actor.id)
        .await
        .map_err(hostel_core::CoreError::from)?;
    Ok(Json(json!({ "message": "All notifications marked as read", "updated": updated })))
}

async fn delete_notification(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let deleted = state
        .notifications
        .delete(id, actor.id)
        .await
        .map_err(hostel_core::CoreError::from)?;
    if !deleted {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Notification deleted" })))
}
