//! Template version management routes

use crate::{
    AppState,
    error::Result,
    models::{
        CreateVersionRequest, CreateVersionResponse, PromoteRequest, PromoteResponse, TenantQuery,
        VersionSummary, scope_from,
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use promptforge_registry::{TemplateKey, VersionId};
use tracing::info;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{key}/versions", get(list_versions).post(create_version))
        .route("/{key}/promote", post(promote))
        .route("/{key}/refresh", post(refresh))
}

/// Persist a new version after a parse-only validation pass. The new version
/// does not go live until it is promoted.
async fn create_version(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<CreateVersionRequest>,
) -> Result<impl IntoResponse> {
    info!(template_key = %key, "creating template version");

    let version = state
        .service
        .create_version(
            &scope_from(request.tenant),
            &TemplateKey::from(key),
            request.display_name.as_deref(),
            &request.source,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateVersionResponse {
            version_id: version.id.0,
            sequence_number: version.sequence_number,
        }),
    ))
}

/// List a template's versions, newest first.
async fn list_versions(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<TenantQuery>,
) -> Result<Json<Vec<VersionSummary>>> {
    let versions = state
        .service
        .list_versions(&scope_from(query.tenant), &TemplateKey::from(key))
        .await?;

    Ok(Json(versions.into_iter().map(VersionSummary::from).collect()))
}

/// Move the current pointer to the given version.
async fn promote(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<PromoteRequest>,
) -> Result<Json<PromoteResponse>> {
    info!(template_key = %key, version_id = %request.version_id, "promoting version");

    state
        .service
        .promote(
            &scope_from(request.tenant),
            &TemplateKey::from(key),
            VersionId(request.version_id),
        )
        .await?;

    Ok(Json(PromoteResponse { ok: true }))
}

/// Force cache invalidation without a content change.
async fn refresh(State(state): State<AppState>, Path(key): Path<String>) -> Result<StatusCode> {
    state.service.refresh(&TemplateKey::from(key)).await;
    Ok(StatusCode::NO_CONTENT)
}
