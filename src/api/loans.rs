// 🏦 Loan endpoints

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::AppState;
use crate::db::loans::{self, LoanStatus, LoanUpdate, NewLoan};
use crate::error::{AppError, AppResult};
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
        .route("/loans/", post(create_loan))
        .route("/loans/:id", patch(update_loan).delete(delete_loan))
        .route("/loans/loan_status/:user_id", get(loan_status))
}

async fn create_loan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewLoan>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let loan = loans::create_loan(&conn, user.id, &body)?;
    tracing::info!(user_id = %user.id, loan_id = %loan.id, "loan created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Loan created successfully", "loan_id": loan.id })),
    ))
}

async fn update_loan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<LoanUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    let loan = loans::update_loan(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Loan updated successfully", "loan_id": loan.id })))
}

async fn delete_loan(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    loans::delete_loan(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Loan deleted successfully" })))
}

/// Only the caller's own status is visible
async fn loan_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(user_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<LoanStatus>>> {
    if user_id != user.id {
        return Err(AppError::forbidden("You don't have permission to view these loans"));
    }

    let conn = state.db();
    let rows = loans::loan_status(&conn, user.id)?;
    if rows.is_empty() {
        return Err(AppError::not_found("No loans found for this user"));
    }
    Ok(Json(rows))
}
