// 🚗 Vehicle endpoints

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::AppState;
use crate::db::vehicles::{self, NewVehicle, Vehicle, VehicleUpdate};
use crate::error::AppResult;
use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/vehicles/", get(list_vehicles).post(create_vehicle))
        .route(
            "/vehicles/:id",
            get(get_vehicle).patch(update_vehicle).delete(delete_vehicle),
        )
}

async fn create_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewVehicle>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let vehicle = vehicles::create_vehicle(&conn, user.id, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Vehicle created successfully", "vehicle_id": vehicle.id })),
    ))
}

async fn list_vehicles(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<Vec<Vehicle>>> {
    let conn = state.db();
    Ok(Json(vehicles::list_vehicles(&conn, user.id)?))
}

async fn get_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Vehicle>> {
    let conn = state.db();
    Ok(Json(vehicles::get_owned_vehicle(&conn, user.id, id)?))
}

async fn update_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<VehicleUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    let vehicle = vehicles::update_vehicle(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Vehicle updated successfully", "vehicle_id": vehicle.id })))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    vehicles::delete_vehicle(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Vehicle deleted successfully" })))
}
