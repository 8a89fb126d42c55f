// 🌐 REST API - axum router, shared state and middleware
//
// Handlers lock the connection only around synchronous repository calls; the
// guard never lives across an `.await`.

mod analysis;
mod auth;
pub mod extract;
mod finance;
mod ingredients;
mod loans;
mod meals;
mod payments;
mod planning;
mod services;
mod settings;
mod vehicles;

use crate::auth::TokenIssuer;
use crate::config::Settings;
use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub settings: Arc<Settings>,
    pub issuer: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(conn: Connection, settings: Settings) -> Result<Self> {
        let issuer = TokenIssuer::from_settings(&settings)?;
        Ok(AppState {
            db: Arc::new(Mutex::new(conn)),
            settings: Arc::new(settings),
            issuer: Arc::new(issuer),
        })
    }

    /// Lock the connection for the duration of a synchronous unit of work.
    ///
    /// A handler that panicked mid-request leaves the mutex poisoned; the
    /// connection is still usable since an open transaction rolls back on drop.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// GET /health
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(settings: &Settings) -> Result<CorsLayer> {
    if settings.debug {
        return Ok(CorsLayer::permissive());
    }

    let origins = settings
        .cors_origins()?
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(&origin).with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any))
}

/// Build the full application router
pub fn router(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.settings)?;

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(auth::routes())
        .merge(finance::routes())
        .merge(loans::routes())
        .merge(payments::routes())
        .merge(vehicles::routes())
        .merge(services::routes())
        .merge(meals::routes())
        .merge(ingredients::routes())
        .merge(planning::routes())
        .merge(analysis::routes())
        .merge(settings::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    Ok(app)
}
