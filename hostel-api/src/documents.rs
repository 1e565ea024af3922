use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hostel_booking::{DocumentInput, ReviewRequest};
use hostel_core::document::{DocumentStatus, LandlordDocument};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{error::AppError, extract::{AppJson, AppQuery}, middleware::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
struct QueueQuery {
    status: Option<DocumentStatus>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/documents", post(submit_documents).get(my_documents))
        .route("/api/admin/documents", get(review_queue))
        .route("/api/admin/verify-document", post(verify_document))
}

async fn submit_documents(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(input): AppJson<DocumentInput>,
) -> Result<(StatusCode, Json<LandlordDocument>), AppError> {
    let document = state.documents.submit(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn my_documents(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
) -> Result<Json<Vec<LandlordDocument>>, AppError> {
    Ok(Json(state.documents.list_own(&actor).await?))
}

async fn review_queue(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppQuery(query): AppQuery<QueueQuery>,
) -> Result<Json<Vec<LandlordDocument>>, AppError> {
    Ok(Json(state.documents.review_queue(&actor, query.status).await?))
}

async fn verify_document(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<Json<Value>, AppError> {
    let document = state.documents.review(&actor, req).await?;
    Ok(Json(json!({
        "message": format!("Document {}", document.status),
        "document": document,
    })))
}
