// 💳 Loan payment endpoints

use super::extract::{ApiJson, ApiPath, CurrentUser};
use super::AppState;
use crate::db::loans::{self, NewPayment, Payment, PaymentUpdate};
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
        .route("/payments/", post(create_payment))
        .route("/payments/loan/:loan_id", get(list_payments))
        .route("/payments/:id", patch(update_payment).delete(delete_payment))
}

async fn create_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<NewPayment>,
) -> AppResult<(StatusCode, Json<Value>)> {
    body.validate()?;
    let conn = state.db();
    let payment = loans::create_payment(&conn, user.id, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Payment added successfully",
            "payment_id": payment.id,
            "paid_at": payment.paid_at,
        })),
    ))
}

async fn list_payments(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(loan_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<Payment>>> {
    let conn = state.db();
    Ok(Json(loans::list_payments(&conn, user.id, loan_id)?))
}

async fn update_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PaymentUpdate>,
) -> AppResult<Json<Value>> {
    body.validate()?;
    let conn = state.db();
    let payment = loans::update_payment(&conn, user.id, id, &body)?;
    Ok(Json(json!({ "message": "Payment updated successfully", "payment_id": payment.id })))
}

async fn delete_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    loans::delete_payment(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Payment deleted successfully" })))
}
