//! Maintenance procedures built on top of the prompt service
//!
//! These compose service operations in-process and report completion only
//! after every step has finished, so callers get real error propagation
//! rather than a fire-and-forget acknowledgement.

use crate::entities::{TemplateKey, TenantScope, VersionId};
use crate::error::{RegistryError, Result};
use crate::resolver::resolve_current;
use crate::service::PromptService;
use std::sync::Arc;
use tracing::{info, warn};

/// Replacement content for one well-known template key.
#[derive(Debug, Clone)]
pub struct TemplateSeed {
    pub scope: TenantScope,
    pub key: TemplateKey,
    pub display_name: String,
    pub source: String,
}

/// Admin operations. Not part of the steady-state hot path.
pub struct AdminOps {
    service: Arc<PromptService>,
}

impl AdminOps {
    pub fn new(service: Arc<PromptService>) -> Self {
        Self { service }
    }

    /// Replace the current content of each seeded template atomically from a
    /// reader's point of view: the replacement version is created and
    /// promoted before the superseded versions are deleted, so a template
    /// that existed before the operation never resolves to zero versions.
    pub async fn force_update(&self, seeds: &[TemplateSeed]) -> Result<usize> {
        let mut updated = 0;

        for seed in seeds {
            let superseded: Vec<VersionId> = match self
                .service
                .list_versions(&seed.scope, &seed.key)
                .await
            {
                Ok(versions) => versions.iter().map(|v| v.id).collect(),
                // First seeding of a template that does not exist yet
                Err(RegistryError::TemplateNotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            };

            let version = self
                .service
                .create_version(
                    &seed.scope,
                    &seed.key,
                    Some(&seed.display_name),
                    &seed.source,
                )
                .await?;
            self.service
                .promote(&seed.scope, &seed.key, version.id)
                .await?;

            if !superseded.is_empty() {
                self.service
                    .delete_versions(&seed.scope, &seed.key, &superseded)
                    .await?;
            }

            info!(
                template_key = %seed.key,
                version_id = %version.id,
                replaced = superseded.len(),
                "force-updated template"
            );
            updated += 1;
        }

        Ok(updated)
    }

    /// Scan every template and persist a repair for null or dangling current
    /// pointers. Returns how many templates were repaired.
    pub async fn repair_pointers(&self) -> Result<usize> {
        let templates = self.service.list_templates().await?;
        let mut repaired = 0;

        for template in templates {
            let versions = self
                .service
                .list_versions(&template.scope, &template.key)
                .await?;

            match resolve_current(&template, &versions) {
                Ok(resolved) if resolved.fallback_used => {
                    self.service
                        .promote(&template.scope, &template.key, resolved.version.id)
                        .await?;
                    repaired += 1;
                }
                Ok(_) => {}
                Err(RegistryError::NoVersionsAvailable(_)) => {
                    warn!(template_key = %template.key, "template has no versions, nothing to repair");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(repaired)
    }

    /// Explicit administrative delete: removes the template identity and
    /// cascades to its versions, then invalidates.
    pub async fn delete_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<()> {
        self.service.delete_template(scope, key).await
    }
}
