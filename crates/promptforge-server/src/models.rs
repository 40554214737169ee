//! Request and response models for the API

use promptforge_registry::{TenantScope, Version};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Resolve the optional tenant field callers send into a scope.
pub fn scope_from(tenant: Option<String>) -> TenantScope {
    match tenant {
        Some(id) if !id.is_empty() => TenantScope::Tenant(id),
        _ => TenantScope::Global,
    }
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub template_key: String,

    #[serde(default)]
    pub tenant: Option<String>,

    /// Variable bindings as a JSON object
    #[serde(default)]
    pub bindings: serde_json::Value,

    /// Escape interpolated values for markup output
    #[serde(default)]
    pub markup: bool,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub text: String,
    pub version_id: Uuid,

    #[serde(with = "time::serde::rfc3339")]
    pub rendered_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    pub source: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateVersionResponse {
    pub version_id: Uuid,
    pub sequence_number: u64,
}

#[derive(Debug, Serialize)]
pub struct VersionSummary {
    pub version_id: Uuid,
    pub sequence_number: u64,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Version> for VersionSummary {
    fn from(version: Version) -> Self {
        Self {
            version_id: version.id.0,
            sequence_number: version.sequence_number,
            created_at: version.created_at,
        }
    }
}

/// Tenant selector for GET endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct TenantQuery {
    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub version_id: Uuid,

    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromoteResponse {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct TemplateSeedRequest {
    pub key: String,
    pub display_name: String,
    pub source: String,

    #[serde(default)]
    pub tenant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForceUpdateRequest {
    pub templates: Vec<TemplateSeedRequest>,
}

#[derive(Debug, Serialize)]
pub struct ForceUpdateResponse {
    pub updated_count: usize,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub repaired_count: usize,
}
