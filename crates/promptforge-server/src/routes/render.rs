//! Rendering route

use crate::{
    AppState,
    error::{ApiError, Result},
    models::{RenderRequest, RenderResponse, scope_from},
};
use axum::{Json, Router, extract::State, routing::post};
use promptforge::{Bindings, OutputContext, bindings_from_json};
use promptforge_registry::TemplateKey;
use tracing::debug;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(render))
}

/// Resolve the current version of a template and render it against the
/// caller's bindings.
async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>> {
    debug!(template_key = %request.template_key, "rendering template");

    let bindings = match request.bindings {
        serde_json::Value::Null => Bindings::new(),
        other => bindings_from_json(other)
            .ok_or_else(|| ApiError::bad_request("bindings must be a JSON object"))?,
    };
    let context = if request.markup {
        OutputContext::Markup
    } else {
        OutputContext::Raw
    };

    let rendered = state
        .service
        .get_rendered(
            &scope_from(request.tenant),
            &TemplateKey::from(request.template_key),
            &bindings,
            context,
        )
        .await?;

    Ok(Json(RenderResponse {
        text: rendered.text,
        version_id: rendered.version_id.0,
        rendered_at: rendered.rendered_at,
    }))
}
