// 🛒 Analysis endpoints

use super::extract::{ApiQuery, CurrentUser};
use super::AppState;
use crate::db::planner;
use crate::error::AppResult;
use crate::shopping::ShoppingList;
use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ShoppingQuery {
    pub start_date: NaiveDate,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/analysis/shopping-list", get(shopping_list))
}

async fn shopping_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<ShoppingQuery>,
) -> AppResult<Json<ShoppingList>> {
    let conn = state.db();
    Ok(Json(planner::shopping_list(&conn, user.id, query.start_date)?))
}
