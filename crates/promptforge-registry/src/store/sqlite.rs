//! SQLite template store
//!
//! Durable backend for templates and version history. Schema is initialized
//! on connect; version immutability is enforced by only ever inserting rows.

use super::TemplateStore;
use crate::entities::{Template, TemplateKey, TenantScope, Version, VersionId};
use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool, sqlite::SqliteConnectOptions, sqlite::SqliteRow};
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// SQLite-backed implementation of [`TemplateStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to the given SQLite database, creating it if missing.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| RegistryError::Storage(format!("Invalid database url: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create a store from the DATABASE_URL environment variable.
    ///
    /// Example: sqlite:./data/promptforge.db
    pub async fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:./data/promptforge.db".to_string());
        Self::new(&database_url).await
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                scope TEXT NOT NULL,                 -- '' for global scope
                key TEXT NOT NULL,
                display_name TEXT NOT NULL,
                current_version_id TEXT,             -- nullable, repairable when dangling
                created_at TEXT NOT NULL,
                PRIMARY KEY (scope, key)
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to create templates table: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS template_versions (
                id TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                template_key TEXT NOT NULL,
                sequence_number INTEGER NOT NULL,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RegistryError::Storage(format!("Failed to create template_versions table: {}", e))
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_template ON template_versions(scope, template_key, sequence_number)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to create version index: {}", e)))?;

        Ok(())
    }
}

fn template_from_row(row: &SqliteRow) -> Result<Template> {
    let scope: String = row.get("scope");
    let key: String = row.get("key");
    let display_name: String = row.get("display_name");
    let current_version_id: Option<String> = row.get("current_version_id");
    let created_at: String = row.get("created_at");

    let current_version = match current_version_id {
        Some(id) => Some(
            VersionId::from_str(&id)
                .map_err(|e| RegistryError::Storage(format!("Invalid version id: {}", e)))?,
        ),
        None => None,
    };

    Ok(Template {
        key: TemplateKey(key),
        scope: TenantScope::from_key_part(&scope),
        display_name,
        current_version,
        created_at: OffsetDateTime::parse(&created_at, &Rfc3339)
            .map_err(|e| RegistryError::Storage(format!("Invalid timestamp: {}", e)))?,
    })
}

fn version_from_row(row: &SqliteRow) -> Result<Version> {
    let id: String = row.get("id");
    let template_key: String = row.get("template_key");
    let sequence_number: i64 = row.get("sequence_number");
    let source: String = row.get("source");
    let created_at: String = row.get("created_at");

    Ok(Version {
        id: VersionId::from_str(&id)
            .map_err(|e| RegistryError::Storage(format!("Invalid version id: {}", e)))?,
        template_key: TemplateKey(template_key),
        sequence_number: sequence_number as u64,
        source,
        created_at: OffsetDateTime::parse(&created_at, &Rfc3339)
            .map_err(|e| RegistryError::Storage(format!("Invalid timestamp: {}", e)))?,
    })
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
    ts.format(&Rfc3339)
        .map_err(|e| RegistryError::Storage(format!("Failed to format timestamp: {}", e)))
}

#[async_trait]
impl TemplateStore for SqliteStore {
    async fn create_template(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: &str,
    ) -> Result<Template> {
        let template = Template::new(scope.clone(), key.clone(), display_name);
        sqlx::query(
            "INSERT OR IGNORE INTO templates (scope, key, display_name, current_version_id, created_at) VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .bind(display_name)
        .bind(format_timestamp(template.created_at)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to create template: {}", e)))?;

        self.get_template(scope, key).await
    }

    async fn get_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Template> {
        let row = sqlx::query("SELECT * FROM templates WHERE scope = ? AND key = ?")
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to fetch template: {}", e)))?
            .ok_or_else(|| RegistryError::TemplateNotFound(key.to_string()))?;

        template_from_row(&row)
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        let rows = sqlx::query("SELECT * FROM templates ORDER BY scope, key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to list templates: {}", e)))?;

        rows.iter().map(template_from_row).collect()
    }

    async fn add_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: Option<&str>,
        source: &str,
    ) -> Result<Version> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to begin transaction: {}", e)))?;

        let now = OffsetDateTime::now_utc();
        sqlx::query(
            "INSERT OR IGNORE INTO templates (scope, key, display_name, current_version_id, created_at) VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .bind(display_name.unwrap_or(key.as_ref()))
        .bind(format_timestamp(now)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to upsert template: {}", e)))?;

        let max_sequence: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence_number) FROM template_versions WHERE scope = ? AND template_key = ?",
        )
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to read max sequence: {}", e)))?;

        let version = Version::new(key.clone(), max_sequence.unwrap_or(0) as u64 + 1, source);
        sqlx::query(
            "INSERT INTO template_versions (id, scope, template_key, sequence_number, source, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(version.id.to_string())
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .bind(version.sequence_number as i64)
        .bind(&version.source)
        .bind(format_timestamp(version.created_at)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to insert version: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to commit version: {}", e)))?;

        Ok(version)
    }

    async fn list_versions(&self, scope: &TenantScope, key: &TemplateKey) -> Result<Vec<Version>> {
        // A template with zero versions is still a template
        self.get_template(scope, key).await?;

        let rows = sqlx::query(
            "SELECT * FROM template_versions WHERE scope = ? AND template_key = ? ORDER BY sequence_number DESC",
        )
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to list versions: {}", e)))?;

        rows.iter().map(version_from_row).collect()
    }

    async fn set_current_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        version_id: VersionId,
    ) -> Result<()> {
        self.get_template(scope, key).await?;

        // Reject cross-template pointer corruption at the boundary
        let owned: Option<String> = sqlx::query_scalar(
            "SELECT id FROM template_versions WHERE id = ? AND scope = ? AND template_key = ?",
        )
        .bind(version_id.to_string())
        .bind(scope.as_key_part())
        .bind(key.as_ref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RegistryError::Storage(format!("Failed to check version: {}", e)))?;

        if owned.is_none() {
            return Err(RegistryError::VersionNotFound {
                template_key: key.to_string(),
                version_id: version_id.to_string(),
            });
        }

        sqlx::query("UPDATE templates SET current_version_id = ? WHERE scope = ? AND key = ?")
            .bind(version_id.to_string())
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .execute(&self.pool)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to set current version: {}", e)))?;

        Ok(())
    }

    async fn delete_versions(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        ids: &[VersionId],
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to begin transaction: {}", e)))?;

        for id in ids {
            sqlx::query(
                "DELETE FROM template_versions WHERE id = ? AND scope = ? AND template_key = ?",
            )
            .bind(id.to_string())
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to delete version: {}", e)))?;

            // Never leave the pointer dangling at a deleted version
            sqlx::query(
                "UPDATE templates SET current_version_id = NULL WHERE scope = ? AND key = ? AND current_version_id = ?",
            )
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to clear pointer: {}", e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to commit deletes: {}", e)))?;

        Ok(())
    }

    async fn delete_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<()> {
        self.get_template(scope, key).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("DELETE FROM template_versions WHERE scope = ? AND template_key = ?")
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to delete versions: {}", e)))?;

        sqlx::query("DELETE FROM templates WHERE scope = ? AND key = ?")
            .bind(scope.as_key_part())
            .bind(key.as_ref())
            .execute(&mut *tx)
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to delete template: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| RegistryError::Storage(format!("Failed to commit delete: {}", e)))?;

        Ok(())
    }
}
