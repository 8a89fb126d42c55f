// 🥕 Ingredient dictionary and meal recipe endpoints
//
// `/meals/ingredients/:id` is a meal id for GET/POST (the recipe) and an
// ingredient id for PATCH/DELETE (the dictionary entry).

use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use super::meals::NameQuery;
use super::AppState;
use crate::db::meals::{
    self, Ingredient, IngredientUpdate, NewIngredient, NewRecipeItem, RecipeItem, RecipeItemUpdate,
};
use crate::error::AppResult;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals/ingredients/", get(list_ingredients).post(create_ingredient))
        .route("/meals/ingredients/search", get(search_ingredients))
        .route(
            "/meals/ingredients/:id",
            get(meal_recipe)
                .post(add_recipe_item)
                .patch(update_ingredient)
                .delete(delete_ingredient),
        )
        .route(
            "/meals/ingredients/recipe/:id",
            patch(update_recipe_item).delete(remove_recipe_item),
        )
}

// ============================================================================
// DICTIONARY
// ============================================================================

async fn create_ingredient(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiJson(body): ApiJson<NewIngredient>,
) -> AppResult<(StatusCode, Json<Ingredient>)> {
    body.validate()?;
    let conn = state.db();
    Ok((StatusCode::CREATED, Json(meals::create_ingredient(&conn, &body)?)))
}

async fn list_ingredients(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
) -> AppResult<Json<Vec<Ingredient>>> {
    let conn = state.db();
    Ok(Json(meals::list_ingredients(&conn)?))
}

async fn search_ingredients(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiQuery(query): ApiQuery<NameQuery>,
) -> AppResult<Json<Vec<Ingredient>>> {
    let conn = state.db();
    Ok(Json(meals::search_ingredients(&conn, &query.name)?))
}

async fn update_ingredient(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<IngredientUpdate>,
) -> AppResult<Json<Ingredient>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(meals::update_ingredient(&conn, id, &body)?))
}

async fn delete_ingredient(
    State(state): State<AppState>,
    CurrentUser(_): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    meals::delete_ingredient(&conn, id)?;
    Ok(Json(json!({ "message": "Deleted" })))
}

// ============================================================================
// RECIPES
// ============================================================================

async fn meal_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(meal_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<RecipeItem>>> {
    let conn = state.db();
    Ok(Json(meals::meal_recipe(&conn, user.id, meal_id)?))
}

async fn add_recipe_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(meal_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewRecipeItem>,
) -> AppResult<(StatusCode, Json<RecipeItem>)> {
    body.validate()?;
    let conn = state.db();
    Ok((StatusCode::CREATED, Json(meals::add_recipe_item(&conn, user.id, meal_id, &body)?)))
}

async fn update_recipe_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RecipeItemUpdate>,
) -> AppResult<Json<RecipeItem>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(meals::update_recipe_item(&conn, user.id, id, &body)?))
}

async fn remove_recipe_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    meals::remove_recipe_item(&conn, user.id, id)?;
    Ok(Json(json!({ "status": "removed" })))
}
