// 💰 Finance endpoints - accounts, categories, import rules, statement import, stats

use super::extract::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use super::AppState;
use crate::db::finance::{
    self, Account, Category, ImportItem, MonthlyStats, PreviewTransaction, Transaction, YearlyStats,
};
use crate::error::{AppError, AppResult};
use crate::rules::KeywordRule;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AccountCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub bank_type: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryBody {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RuleCreate {
    pub account_id: Uuid,
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub keyword: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RuleUpdate {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryAssignment {
    pub category_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Deserialize)]
pub struct YearlyQuery {
    pub year: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/finance/accounts", get(list_accounts).post(create_account))
        .route("/finance/accounts/:id", delete(delete_account))
        .route("/finance/accounts/:id/transactions", delete(clear_transactions))
        .route("/finance/categories", get(list_categories).post(create_category))
        .route("/finance/categories/:id", put(rename_category).delete(delete_category))
        .route("/finance/rules", post(create_rule))
        .route("/finance/rules/:id", get(list_rules).put(update_rule).delete(delete_rule))
        .route("/finance/import/preview/:account_id", post(preview_import))
        .route("/finance/import/confirm/:account_id", post(confirm_import))
        .route("/finance/transactions/:id", get(list_transactions))
        .route("/finance/transactions/:id/category", patch(set_category))
        .route("/finance/stats/monthly/:account_id", get(monthly_stats))
        .route("/finance/stats/yearly/:account_id", get(yearly_stats))
}

// ============================================================================
// ACCOUNTS
// ============================================================================

async fn list_accounts(State(state): State<AppState>, CurrentUser(user): CurrentUser) -> AppResult<Json<Vec<Account>>> {
    let conn = state.db();
    Ok(Json(finance::list_accounts(&conn, user.id)?))
}

async fn create_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<AccountCreate>,
) -> AppResult<(StatusCode, Json<Account>)> {
    body.validate()?;
    let conn = state.db();
    let account = finance::create_account(&conn, user.id, &body.name, &body.bank_type)?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    finance::delete_account(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}

async fn clear_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    let deleted = finance::clear_account_transactions(&conn, user.id, id)?;
    Ok(Json(json!({
        "message": format!("Deleted {} transactions", deleted),
        "deleted": deleted,
    })))
}

// ============================================================================
// CATEGORIES
// ============================================================================

async fn list_categories(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let conn = state.db();
    Ok(Json(finance::list_categories(&conn, user.id)?))
}

async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CategoryBody>,
) -> AppResult<(StatusCode, Json<Category>)> {
    body.validate()?;
    let conn = state.db();
    let category = finance::create_category(&conn, user.id, &body.name)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn rename_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CategoryBody>,
) -> AppResult<Json<Category>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(finance::rename_category(&conn, user.id, id, &body.name)?))
}

async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    finance::delete_category(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

// ============================================================================
// IMPORT RULES
// ============================================================================

/// GET /finance/rules/:account_id
async fn list_rules(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<KeywordRule>>> {
    let conn = state.db();
    Ok(Json(finance::list_rules(&conn, user.id, account_id)?))
}

async fn create_rule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<RuleCreate>,
) -> AppResult<(StatusCode, Json<KeywordRule>)> {
    body.validate()?;
    let conn = state.db();
    let rule = finance::create_rule(&conn, user.id, body.account_id, body.category_id, &body.keyword)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RuleUpdate>,
) -> AppResult<Json<KeywordRule>> {
    body.validate()?;
    let conn = state.db();
    Ok(Json(finance::update_rule(&conn, user.id, id, body.category_id, &body.keyword)?))
}

async fn delete_rule(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    finance::delete_rule(&conn, user.id, id)?;
    Ok(Json(json!({ "message": "Rule deleted successfully" })))
}

// ============================================================================
// IMPORT
// ============================================================================

/// POST /finance/import/preview/:account_id (multipart field `file`)
async fn preview_import(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<PreviewTransaction>>> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|e| AppError::bad_request(e.body_text()))?;
            file = Some(bytes);
            break;
        }
    }
    let file = file.ok_or_else(|| AppError::Validation(vec!["file: field required".to_string()]))?;

    let conn = state.db();
    Ok(Json(finance::preview_import(&conn, user.id, account_id, &file)?))
}

async fn confirm_import(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiJson(items): ApiJson<Vec<ImportItem>>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    let imported = finance::confirm_import(&conn, user.id, account_id, &items)?;
    Ok(Json(json!({ "message": format!("Successfully imported {} transactions", imported) })))
}

// ============================================================================
// TRANSACTIONS & STATS
// ============================================================================

async fn list_transactions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
) -> AppResult<Json<Vec<Transaction>>> {
    let conn = state.db();
    Ok(Json(finance::list_transactions(&conn, user.id, account_id)?))
}

async fn set_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CategoryAssignment>,
) -> AppResult<Json<Value>> {
    let conn = state.db();
    finance::set_transaction_category(&conn, user.id, id, body.category_id)?;
    Ok(Json(json!({ "message": "Transaction category updated" })))
}

async fn monthly_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MonthlyQuery>,
) -> AppResult<Json<MonthlyStats>> {
    let conn = state.db();
    Ok(Json(finance::monthly_stats(&conn, user.id, account_id, query.month, query.year)?))
}

async fn yearly_stats(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(account_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<YearlyQuery>,
) -> AppResult<Json<YearlyStats>> {
    let conn = state.db();
    Ok(Json(finance::yearly_stats(&conn, user.id, account_id, query.year)?))
}
