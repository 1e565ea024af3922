use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use hostel_booking::{BookingRequest, DateChange};
use hostel_core::booking::Booking;
use hostel_core::CoreError;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{error::AppError, extract::{AppJson, AppPath}, middleware::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
struct CancelRequest {
    booking_id: Option<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(create_booking).get(list_bookings))
        .route("/api/bookings/cancel-booking", post(cancel_booking))
        .route(
            "/api/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(req): AppJson<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    match state.bookings.create(&actor, req).await {
        Ok(booking) => {
            state.metrics.bookings_created.inc();
            Ok((StatusCode::CREATED, Json(booking)))
        }
        Err(e) => {
            if matches!(e, CoreError::Conflict(_)) {
                state.metrics.booking_conflicts.inc();
            }
            Err(e.into())
        }
    }
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list(&actor).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.get(&actor, id).await?))
}

async fn update_booking(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(change): AppJson<DateChange>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.reschedule(&actor, id, change).await?))
}

async fn delete_booking(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.bookings.delete(&actor, id).await?;
    Ok(Json(json!({ "message": "Booking deleted" })))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(req): AppJson<CancelRequest>,
) -> Result<Json<Value>, AppError> {
    let id = req
        .booking_id
        .ok_or_else(|| AppError::ValidationError("booking_id is required".to_string()))?;
    let booking = state.bookings.cancel(&actor, id).await?;
    Ok(Json(json!({ "message": "Booking cancelled", "booking": booking })))
}
