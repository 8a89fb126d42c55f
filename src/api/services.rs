// 🔧 Vehicle service history endpoints

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::AppState;
use crate::db::vehicles::{
    self, NewServiceEvent, NewServiceItem, ServiceEvent, ServiceEventUpdate, ServiceItemUpdate,
};
use crate::error::AppResult;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/services/events", post(create_event))
        .route("/services/events/:id", patch(update_event).delete(delete_event))
        .route("/services/items", post(add_item))
        .route("/services/items/:id", patch(update_item).delete(delete_item))
        .route("/services/vehicle/:vehicle_id", get(vehicle_history))
}

async fn create_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewServiceEvent>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let event = vehicles::create_event(&conn, user.id, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Service event created", "event_id": event.id })),
    ))
}

async fn update_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ServiceEventUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    vehicles::update_event(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Service event updated and vehicle cache synced" })))
}

async fn delete_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    vehicles::delete_event(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Service event and items deleted, vehicle cache updated" })))
}

async fn add_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewServiceItem>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let item = vehicles::add_item(&conn, user.id, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Service item added and total cost updated", "item_id": item.id })),
    ))
}

async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<ServiceItemUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    vehicles::update_item(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Service item updated and total cost updated" })))
}

async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    vehicles::delete_item(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Item deleted and total cost updated" })))
}

async fn vehicle_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(vehicle_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<ServiceEvent>>> {
    let conn = state.db();
    Ok(Json(vehicles::vehicle_history(&conn, user.id, vehicle_id)?))
}
