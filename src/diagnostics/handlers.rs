use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument};

use super::dump::DiagnosticsDump;
use crate::claims::ClaimRecord;
use crate::shared::{AppError, AppState};
use crate::types::{ActionCategory, TargetKey};

/// Routes of the diagnostics surface
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/diagnostics", get(get_diagnostics))
        .route("/claims", get(list_claims))
        .route("/claims/:subject/:action", get(get_claim))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP handler for the full diagnostic dump
///
/// GET /diagnostics
#[instrument(name = "get_diagnostics", skip(state))]
pub async fn get_diagnostics(State(state): State<AppState>) -> Json<DiagnosticsDump> {
    let coordinator = state.coordinator.lock().await;
    Json(DiagnosticsDump::capture(&coordinator))
}

/// HTTP handler for listing pending and confirmed claims
///
/// GET /claims
#[instrument(name = "list_claims", skip(state))]
pub async fn list_claims(State(state): State<AppState>) -> Json<Vec<ClaimRecord>> {
    let claims = state.coordinator.lock().await.active_claims();
    debug!(claim_count = claims.len(), "Listed active claims");
    Json(claims)
}

/// HTTP handler for one target key
///
/// GET /claims/:subject/:action
/// Returns 404 when nobody claims the target
#[instrument(name = "get_claim", skip(state))]
pub async fn get_claim(
    State(state): State<AppState>,
    Path((subject, action)): Path<(String, String)>,
) -> Result<Json<ClaimRecord>, AppError> {
    let action = ActionCategory::try_from(action.as_str())
        .map_err(|raw| AppError::BadRequest(format!("unknown action category: {}", raw)))?;
    let target = TargetKey::new(subject, action);

    state
        .coordinator
        .lock()
        .await
        .claim(&target)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{} is unclaimed", target)))
}
