//! Storage abstraction for templates and their version history
//!
//! The store is the system of record: conflicting writes to the same template
//! are serialized by the backend's own transactional guarantees, the registry
//! never invents its own distributed lock.

use crate::entities::{Template, TemplateKey, TenantScope, Version, VersionId};
use crate::error::Result;
use async_trait::async_trait;

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Durable record keeper for templates and versions.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Create a template identity if it does not exist yet. Returns the
    /// existing record otherwise, so first-version creation is idempotent.
    async fn create_template(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: &str,
    ) -> Result<Template>;

    /// Fetch a template identity.
    async fn get_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Template>;

    /// List every template identity across all scopes. Used by admin scans.
    async fn list_templates(&self) -> Result<Vec<Template>>;

    /// Append a new immutable version with `sequence_number = max + 1`
    /// (1 when none exist). Creates the template identity on first use and
    /// never moves the current pointer.
    async fn add_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: Option<&str>,
        source: &str,
    ) -> Result<Version>;

    /// List all versions of a template, newest first.
    async fn list_versions(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Vec<Version>>;

    /// Move the current pointer. Fails with `VersionNotFound` when the
    /// version id does not belong to the named template, so cross-template
    /// pointer corruption is rejected at the boundary.
    async fn set_current_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        version_id: VersionId,
    ) -> Result<()>;

    /// Delete the given versions. If the current pointer referenced one of
    /// them it is cleared rather than left dangling.
    async fn delete_versions(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        ids: &[VersionId],
    ) -> Result<()>;

    /// Delete a template identity and cascade to all of its versions.
    async fn delete_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<()>;
}
