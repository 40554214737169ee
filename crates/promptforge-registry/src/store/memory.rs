//! In-memory template store
//!
//! Default backend for tests and single-process deployments. All records
//! live behind one async RwLock; operations on a single template are
//! serialized by the write lock.

use super::TemplateStore;
use crate::entities::{Template, TemplateKey, TenantScope, Version, VersionId};
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct TemplateRecord {
    template: Template,
    versions: Vec<Version>,
}

/// In-memory implementation of [`TemplateStore`].
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(TenantScope, TemplateKey), TemplateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Corrupt a template's current pointer. Test hook for exercising the
    /// resolver's dangling-pointer fallback.
    pub async fn poison_current_pointer(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        bogus: VersionId,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(scope.clone(), key.clone()))
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;
        record.template.current_version = Some(bogus);
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn create_template(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: &str,
    ) -> Result<Template> {
        let mut records = self.records.write().await;
        let record = records
            .entry((scope.clone(), key.clone()))
            .or_insert_with(|| TemplateRecord {
                template: Template::new(scope.clone(), key.clone(), display_name),
                versions: Vec::new(),
            });
        Ok(record.template.clone())
    }

    async fn get_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Template> {
        let records = self.records.read().await;
        records
            .get(&(scope.clone(), key.clone()))
            .map(|r| r.template.clone())
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        let records = self.records.read().await;
        Ok(records.values().map(|r| r.template.clone()).collect())
    }

    async fn add_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: Option<&str>,
        source: &str,
    ) -> Result<Version> {
        let mut records = self.records.write().await;
        let record = records
            .entry((scope.clone(), key.clone()))
            .or_insert_with(|| {
                let name = display_name.unwrap_or(key.as_ref());
                TemplateRecord {
                    template: Template::new(scope.clone(), key.clone(), name),
                    versions: Vec::new(),
                }
            });
        let next_sequence = record
            .versions
            .iter()
            .map(|v| v.sequence_number)
            .max()
            .unwrap_or(0)
            + 1;
        let version = Version::new(key.clone(), next_sequence, source);
        record.versions.push(version.clone());
        Ok(version)
    }

    async fn list_versions(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Vec<Version>> {
        let records = self.records.read().await;
        let record = records
            .get(&(scope.clone(), key.clone()))
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;
        let mut versions = record.versions.clone();
        versions.sort_by(|a, b| b.sequence_number.cmp(&a.sequence_number));
        Ok(versions)
    }

    async fn set_current_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        version_id: VersionId,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(scope.clone(), key.clone()))
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;
        if !record.versions.iter().any(|v| v.id == version_id) {
            return Err(RegistryError::VersionNotFound {
                template_key: key.to_string(),
                version_id: version_id.to_string(),
            });
        }
        record.template.current_version = Some(version_id);
        Ok(())
    }

    async fn delete_versions(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        ids: &[VersionId],
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(scope.clone(), key.clone()))
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;
        record.versions.retain(|v| !ids.contains(&v.id));
        // Never leave the pointer dangling at a deleted version
        if let Some(current) = record.template.current_version {
            if ids.contains(&current) {
                record.template.current_version = None;
            }
        }
        Ok(())
    }

    async fn delete_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .remove(&(scope.clone(), key.clone()))
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;
        Ok(())
    }
}
