// 🍽️ Meal endpoints - meals and the protein/base dictionaries

use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use super::AppState;
use crate::db::meals::{
    self, DictEntry, DictEntryUpdate, DictKind, Meal, MealSummary, MealUpdate, NewDictEntry, NewMeal,
};
use crate::error::AppResult;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals/", get(list_meals).post(create_meal))
        .route("/meals/simple-list", get(simple_list))
        .route("/meals/search", get(search_meals))
        .route("/meals/:id", get(get_meal).patch(update_meal).delete(delete_meal))
        .route("/meals/proteins/all", get(list_dict::<Protein>))
        .route("/meals/proteins/", post(create_dict::<Protein>))
        .route("/meals/proteins/:id", patch(update_dict::<Protein>).delete(delete_dict::<Protein>))
        .route("/meals/bases/all", get(list_dict::<Base>))
        .route("/meals/bases/", post(create_dict::<Base>))
        .route("/meals/bases/:id", patch(update_dict::<Base>).delete(delete_dict::<Base>))
}

// ============================================================================
// MEALS
// ============================================================================

async fn create_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewMeal>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let meal = meals::create_meal(&conn, user.id, &body)?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "Meal created", "id": meal.id }))))
}

async fn list_meals(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<Vec<Meal>>> {
    let conn = state.db();
    Ok(Json(meals::list_meals(&conn, user.id)?))
}

async fn simple_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<MealSummary>>> {
    let conn = state.db();
    Ok(Json(meals::list_meal_summaries(&conn, user.id)?))
}

async fn search_meals(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<NameQuery>,
) -> AppResult<Json<Vec<Meal>>> {
    let conn = state.db();
    Ok(Json(meals::search_meals(&conn, user.id, &query.name)?))
}

async fn get_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Meal>> {
    let conn = state.db();
    Ok(Json(meals::get_owned_meal(&conn, user.id, id)?))
}

async fn update_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<MealUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    let meal = meals::update_meal(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Updated", "id": meal.id })))
}

async fn delete_meal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    meals::delete_meal(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Deleted" })))
}

// ============================================================================
// DICTIONARIES
// ============================================================================

/// Selects a dictionary table at the type level so one set of handlers serves both
trait Dictionary: Send + Sync + 'static {
    const KIND: DictKind;
}

struct Protein;
struct Base;

impl Dictionary for Protein {
    const KIND: DictKind = DictKind::Protein;
}

impl Dictionary for Base {
    const KIND: DictKind = DictKind::Base;
}

async fn list_dict<D: Dictionary>(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> AppResult<Json<Vec<DictEntry>>> {
    let conn = state.db();
    Ok(Json(meals::list_dict(&conn, D::KIND)?))
}

async fn create_dict<D: Dictionary>(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiJson(body): ApiJson<NewDictEntry>,
) -> AppResult<(StatusCode, Json<DictEntry>)> {
    body.validate()?;
    let conn = state.db();
    Ok((StatusCode::CREATED, Json(meals::create_dict(&conn, D::KIND, &body)?)))
}

async fn update_dict<D: Dictionary>(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<DictEntryUpdate>,
) -> AppResult<Json<DictEntry>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(meals::update_dict(&conn, D::KIND, id, &body)?))
}

async fn delete_dict<D: Dictionary>(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    meals::delete_dict(&conn, D::KIND, id)?;
    Ok(Json(json!({ "message": "Deleted" })))
}
