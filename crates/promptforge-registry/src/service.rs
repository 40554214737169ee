//! Prompt service: the public contract composing store, resolver, cache and
//! engine
//!
//! Reads go cache → resolver → store → engine; writes go store → cache
//! invalidation, in that order, so a reader that observes the invalidation is
//! guaranteed to see the new write on its next load.

use crate::cache::{CacheKey, PromptCache, ResolvedSource};
use crate::entities::{RenderedPrompt, Template, TemplateKey, TenantScope, Version, VersionId};
use crate::error::{RegistryError, Result};
use crate::resolver::resolve_current;
use crate::store::TemplateStore;
use promptforge::{Bindings, OutputContext, ParsedTemplate};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Transient store failures are retried this many times with doubling delay.
const MAX_RETRIES: u32 = 2;

/// Orchestrator for rendering and version management.
pub struct PromptService {
    store: Arc<dyn TemplateStore>,
    cache: Arc<PromptCache>,
    // Parsed templates are immutable once produced, so the map is read-mostly
    // and shared across concurrent renders without per-render locking.
    parsed: RwLock<HashMap<VersionId, Arc<ParsedTemplate>>>,
    store_timeout: Duration,
    retry_base_delay: Duration,
}

impl PromptService {
    pub fn new(store: Arc<dyn TemplateStore>, cache: Arc<PromptCache>) -> Self {
        Self {
            store,
            cache,
            parsed: RwLock::new(HashMap::new()),
            store_timeout: Duration::from_secs(5),
            retry_base_delay: Duration::from_millis(50),
        }
    }

    /// Override the deadline applied to each store call.
    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    /// Access to the cache layer (for admin operations and health probes).
    pub fn cache(&self) -> &Arc<PromptCache> {
        &self.cache
    }

    /// Resolve the current version of a template and render it against the
    /// caller's bindings.
    pub async fn get_rendered(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        bindings: &Bindings,
        context: OutputContext,
    ) -> Result<RenderedPrompt> {
        let cache_key = CacheKey::new(key.clone(), scope.clone());
        let resolved = self
            .cache
            .get_or_load(&cache_key, || self.load_resolved(scope, key))
            .await?;

        let parsed = self.parsed_for(resolved.version_id, &resolved.source)?;
        let text = parsed.render(bindings, context)?;

        Ok(RenderedPrompt {
            text,
            template_key: key.clone(),
            version_id: resolved.version_id,
            rendered_at: OffsetDateTime::now_utc(),
        })
    }

    /// Validate template syntax with a parse-only pass, then persist a new
    /// version. The new version never auto-activates.
    pub async fn create_version(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        display_name: Option<&str>,
        source: &str,
    ) -> Result<Version> {
        // Catch MalformedTemplate before anything is written
        ParsedTemplate::parse(source)?;

        let version = self
            .with_retry(|| self.store.add_version(scope, key, display_name, source))
            .await?;

        // A new highest sequence changes what a null pointer resolves to
        self.cache.invalidate_template(key).await;

        debug!(
            template_key = %key,
            version_id = %version.id,
            sequence = version.sequence_number,
            "created template version"
        );
        Ok(version)
    }

    /// Move the current pointer, then invalidate. The invalidation is ordered
    /// strictly after the durable write completes.
    pub async fn promote(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        version_id: VersionId,
    ) -> Result<()> {
        self.with_retry(|| self.store.set_current_version(scope, key, version_id))
            .await?;
        self.cache.invalidate_template(key).await;
        Ok(())
    }

    /// Force cache invalidation without a content change. Used after
    /// out-of-band administrative fixes.
    pub async fn refresh(&self, key: &TemplateKey) {
        self.cache.invalidate_template(key).await;
    }

    /// List a template's versions, newest first.
    pub async fn list_versions(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
    ) -> Result<Vec<Version>> {
        self.with_retry(|| self.store.list_versions(scope, key))
            .await
    }

    /// List every template identity across all scopes.
    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        self.with_retry(|| self.store.list_templates()).await
    }

    /// Delete the given versions, then invalidate.
    pub async fn delete_versions(
        &self,
        scope: &TenantScope,
        key: &TemplateKey,
        ids: &[VersionId],
    ) -> Result<()> {
        self.with_retry(|| self.store.delete_versions(scope, key, ids))
            .await?;
        self.cache.invalidate_template(key).await;
        Ok(())
    }

    /// Delete a template identity, cascading to its versions, then
    /// invalidate.
    pub async fn delete_template(&self, scope: &TenantScope, key: &TemplateKey) -> Result<()> {
        self.with_retry(|| self.store.delete_template(scope, key))
            .await?;
        self.cache.invalidate_template(key).await;
        Ok(())
    }

    /// Cache loader: resolve the authoritative version from the store.
    async fn load_resolved(&self, scope: &TenantScope, key: &TemplateKey) -> Result<ResolvedSource> {
        let template = self
            .with_retry(|| self.store.get_template(scope, key))
            .await?;
        let versions = self
            .with_retry(|| self.store.list_versions(scope, key))
            .await?;

        let resolved = resolve_current(&template, &versions)?;
        if resolved.fallback_used {
            // Best effort: persist the fallback so the anomaly heals. A
            // failed repair never affects this read.
            self.spawn_repair(scope.clone(), key.clone(), resolved.version.id);
        }

        Ok(ResolvedSource {
            version_id: resolved.version.id,
            source: resolved.version.source,
        })
    }

    fn spawn_repair(&self, scope: TenantScope, key: TemplateKey, version_id: VersionId) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.set_current_version(&scope, &key, version_id).await {
                Ok(()) => debug!(template_key = %key, %version_id, "repaired current pointer"),
                Err(e) => warn!(
                    template_key = %key,
                    error = %e,
                    "best-effort pointer repair failed"
                ),
            }
        });
    }

    /// Memoize parsed templates per version id. Versions are immutable, so an
    /// entry never needs refreshing.
    fn parsed_for(&self, version_id: VersionId, source: &str) -> Result<Arc<ParsedTemplate>> {
        if let Some(parsed) = self
            .parsed
            .read()
            .map_err(|_| RegistryError::Storage("parsed-template cache lock poisoned".to_string()))?
            .get(&version_id)
        {
            return Ok(Arc::clone(parsed));
        }

        let parsed = Arc::new(ParsedTemplate::parse(source)?);
        self.parsed
            .write()
            .map_err(|_| RegistryError::Storage("parsed-template cache lock poisoned".to_string()))?
            .insert(version_id, Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Apply the store deadline and retry transient failures with bounded
    /// doubling backoff. All store operations here are idempotent or, for
    /// version creation, harmless to repeat.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.retry_base_delay;
        let mut attempt = 0;
        loop {
            let outcome = match timeout(self.store_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(RegistryError::Timeout),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(error = %e, attempt, "transient store failure, retrying");
                    sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
