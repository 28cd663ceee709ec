use crate::{AppState, error::AppError};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse},
};
use database::{StatementOutcome, has_internal_semicolon};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// The deploy metadata echoed back by `GET /metadata`.
#[derive(Debug, Serialize)]
pub struct Metadata {
    pub app_name: String,
    pub app_version: String,
    pub deploy_region: String,
}

/// The request body for `POST /run_sql`.
#[derive(Debug, Deserialize)]
pub struct RunSqlRequest {
    pub sql: String,
}

/// # GET /
/// Serves the static landing page.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// # GET /metadata
/// Reports the configured deployment metadata. Never touches the database and
/// has no failure modes.
pub async fn metadata(State(state): State<Arc<AppState>>) -> Json<Metadata> {
    Json(Metadata {
        app_name: state.settings.app_name.clone(),
        app_version: state.settings.app_version.clone(),
        deploy_region: state.settings.deploy_region.clone(),
    })
}

/// # GET /health
/// Confirms end-to-end database reachability with a liveness query. Answers
/// 200 when the database responds and 503 when it does not; the strategy in
/// use decides what "obtaining a connection" means.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.database.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database.");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "disconnected" })),
            )
        }
    }
}

/// # POST /run_sql
/// Executes one client-supplied SQL statement verbatim and returns the
/// select/modify envelope. All validation runs before a connection is
/// acquired, so rejected requests never touch the database.
pub async fn run_sql(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RunSqlRequest>, JsonRejection>,
) -> Result<Json<StatementOutcome>, AppError> {
    let Json(request) = body.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    if request.sql.trim().is_empty() {
        return Err(AppError::Validation(
            "The `sql` field must contain a statement".to_string(),
        ));
    }
    // The statement is checked untrimmed: one semicolon as the very last
    // character is tolerated, a semicolon anywhere else is not.
    if has_internal_semicolon(&request.sql) {
        return Err(AppError::Validation(
            "Only a single SQL statement is allowed per request".to_string(),
        ));
    }

    let outcome = state.database.run_statement(&request.sql).await?;
    Ok(Json(outcome))
}

/// Fallback for any path outside the route table.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}
