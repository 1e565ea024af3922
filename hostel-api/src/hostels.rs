use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Extension, Json, Router,
};
use hostel_catalog::{HostelDetails, HostelInput, HostelSearch, HostelUpdate, RoomInput, RoomUpdate};
use hostel_core::listing::{Hostel, HostelListing, Page, Room};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    middleware::{optional_actor, AuthUser},
    state::AppState,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/api/hostels", get(search_hostels))
        .route("/api/hostels/{id}", get(get_hostel))
        .route("/api/hostels/{id}/rooms", get(list_rooms))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/hostels", post(create_hostel))
        .route("/api/hostels/{id}", put(update_hostel).delete(delete_hostel))
        .route("/api/hostels/{id}/rooms", post(add_room))
        .route("/api/rooms/{id}", put(update_room).delete(delete_room))
}

async fn search_hostels(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<HostelSearch>,
) -> Result<Json<Page<HostelListing>>, AppError> {
    Ok(Json(state.catalog.search(query).await?))
}

async fn get_hostel(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<HostelDetails>, AppError> {
    let viewer = optional_actor(&state, &headers);
    Ok(Json(state.catalog.details(viewer.as_ref(), id).await?))
}

async fn create_hostel(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppJson(input): AppJson<HostelInput>,
) -> Result<(StatusCode, Json<Hostel>), AppError> {
    let hostel = state.catalog.create_hostel(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(hostel)))
}

async fn update_hostel(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<HostelUpdate>,
) -> Result<Json<Hostel>, AppError> {
    Ok(Json(state.catalog.update_hostel(&actor, id, update).await?))
}

async fn delete_hostel(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.catalog.delete_hostel(&actor, id).await?;
    Ok(Json(json!({ "message": "Hostel deleted" })))
}

async fn list_rooms(State(state): State<AppState>, AppPath(id): AppPath<Uuid>) -> Result<Json<Vec<Room>>, AppError> {
    Ok(Json(state.catalog.rooms(id).await?))
}

async fn add_room(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(hostel_id): AppPath<Uuid>,
    AppJson(input): AppJson<RoomInput>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let room = state.catalog.add_room(&actor, hostel_id, input).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn update_room(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(update): AppJson<RoomUpdate>,
) -> Result<Json<Room>, AppError> {
    Ok(Json(state.catalog.update_room(&actor, id, update).await?))
}

async fn delete_room(
    State(state): State<AppState>,
    Extension(AuthUser(actor)): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.catalog.delete_room(&actor, id).await?;
    Ok(Json(json!({ "message": "Room deleted" })))
}
