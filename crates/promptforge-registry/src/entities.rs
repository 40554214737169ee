//! Core data structures for the promptforge registry

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stable external identifier for a template, unique within a tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateKey(pub String);

impl From<String> for TemplateKey {
    fn from(s: String) -> Self {
        TemplateKey(s)
    }
}

impl From<&str> for TemplateKey {
    fn from(s: &str) -> Self {
        TemplateKey(s.to_string())
    }
}

impl AsRef<str> for TemplateKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque version identifier. UUIDv7, so ids order by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionId(pub Uuid);

impl VersionId {
    pub fn generate() -> Self {
        VersionId(Uuid::now_v7())
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for VersionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VersionId(Uuid::parse_str(s)?))
    }
}

/// Tenant boundary a template belongs to. The core trusts the caller to have
/// already authorized the scope it passes in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TenantScope {
    /// Visible to every tenant
    Global,

    /// Scoped to a single tenant
    Tenant(String),
}

impl TenantScope {
    /// Stable string form used in cache keys and storage columns.
    pub fn as_key_part(&self) -> &str {
        match self {
            TenantScope::Global => "",
            TenantScope::Tenant(id) => id,
        }
    }

    pub fn from_key_part(part: &str) -> Self {
        if part.is_empty() {
            TenantScope::Global
        } else {
            TenantScope::Tenant(part.to_string())
        }
    }
}

impl Default for TenantScope {
    fn default() -> Self {
        TenantScope::Global
    }
}

/// A named, tenant-scoped template identity with a movable current pointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Stable external identifier
    pub key: TemplateKey,

    /// Tenant boundary
    pub scope: TenantScope,

    /// Human-readable name
    pub display_name: String,

    /// The version served by default. `None` or a dangling reference is a
    /// repairable inconsistency, never a crash.
    pub current_version: Option<VersionId>,

    /// When the template identity was created
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Template {
    pub fn new(
        scope: TenantScope,
        key: impl Into<TemplateKey>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            scope,
            display_name: display_name.into(),
            current_version: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// One immutable snapshot of template source. Editing content always creates
/// a new version; existing versions are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    /// Opaque, creation-ordered identifier
    pub id: VersionId,

    /// Template this version belongs to
    pub template_key: TemplateKey,

    /// Strictly increasing per template, assigned by the store
    pub sequence_number: u64,

    /// Template source text
    pub source: String,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Version {
    pub fn new(template_key: TemplateKey, sequence_number: u64, source: impl Into<String>) -> Self {
        Self {
            id: VersionId::generate(),
            template_key,
            sequence_number,
            source: source.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Result of rendering a template's current version. Transient, never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub text: String,
    pub template_key: TemplateKey,
    pub version_id: VersionId,

    #[serde(with = "time::serde::rfc3339")]
    pub rendered_at: OffsetDateTime,
}
