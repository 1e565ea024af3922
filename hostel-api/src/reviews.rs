use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hostel_catalog::{HostelReviews, ReviewInput};
use hostel_core::listing::Review;
use uuid::Uuid;

use crate::{error::AppError, extract::{AppJson, AppPath}, middleware::AuthUser, state::AppState};

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/api/review/{id}/reviews", get(hostel_reviews))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/review/{id}/reviews", post(submit_review))
}

async fn submit_review(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(hostel_id): AppPath<Uuid>,
    AppJson(input): AppJson<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let review = state.catalog.submit_review(&actor, hostel_id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn hostel_reviews(
    State(state): State<AppState>,
    AppPath(hostel_id): AppPath<Uuid>,
) -> Result<Json<HostelReviews>, AppError> {
    Ok(Json(state.catalog.reviews(hostel_id).await?))
}
