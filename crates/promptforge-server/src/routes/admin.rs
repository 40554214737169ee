//! Admin maintenance routes
//!
//! Not part of the steady-state hot path. Both operations report completion
//! only after every step has finished.

use crate::{
    AppState,
    error::Result,
    models::{ForceUpdateRequest, ForceUpdateResponse, RepairResponse, scope_from},
};
use axum::{Json, Router, extract::State, routing::post};
use promptforge_registry::TemplateSeed;
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/force-update", post(force_update))
        .route("/repair", post(repair))
}

/// Replace the current content of the given template keys atomically from a
/// reader's point of view.
async fn force_update(
    State(state): State<AppState>,
    Json(request): Json<ForceUpdateRequest>,
) -> Result<Json<ForceUpdateResponse>> {
    info!(count = request.templates.len(), "force-updating templates");

    let seeds: Vec<TemplateSeed> = request
        .templates
        .into_iter()
        .map(|seed| TemplateSeed {
            scope: scope_from(seed.tenant),
            key: seed.key.into(),
            display_name: seed.display_name,
            source: seed.source,
        })
        .collect();

    let updated_count = state.admin.force_update(&seeds).await?;
    Ok(Json(ForceUpdateResponse { updated_count }))
}

/// Scan for null or dangling current pointers and persist repairs.
async fn repair(State(state): State<AppState>) -> Result<Json<RepairResponse>> {
    let repaired_count = state.admin.repair_pointers().await?;
    info!(repaired_count, "pointer repair scan complete");
    Ok(Json(RepairResponse { repaired_count }))
}
