//! Read-through TTL cache for resolved template artifacts
//!
//! The cache holds only derived state: the resolved `(version id, source)`
//! for a `(template key, tenant scope)` pair. It can be flushed at any time
//! with no data loss, and a broken backend degrades the layer to a no-op
//! instead of failing callers.

use crate::entities::{TemplateKey, TenantScope, VersionId};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::warn;

/// Cache entries are keyed by template key and tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub template_key: TemplateKey,
    pub scope: TenantScope,
}

impl CacheKey {
    pub fn new(template_key: impl Into<TemplateKey>, scope: TenantScope) -> Self {
        Self {
            template_key: template_key.into(),
            scope,
        }
    }
}

/// The cached artifact: which version resolved and its source text.
/// Rendering against caller bindings happens per request, so bound output is
/// never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub version_id: VersionId,
    pub source: String,
}

/// Backend failures never reach callers; they only flip the layer into
/// degraded pass-through mode.
#[derive(Error, Debug)]
#[error("cache backend unavailable: {0}")]
pub struct CacheError(pub String);

/// Disposable key-value backend behind the cache layer.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<ResolvedSource>, CacheError>;

    async fn put(
        &self,
        key: &CacheKey,
        value: ResolvedSource,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError>;

    async fn delete(&self, key: &CacheKey) -> std::result::Result<(), CacheError>;

    /// Delete every entry for a template key, across all tenant scopes.
    async fn delete_template(&self, key: &TemplateKey) -> std::result::Result<(), CacheError>;

    async fn flush(&self) -> std::result::Result<(), CacheError>;
}

/// In-process cache backend with absolute expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, (ResolvedSource, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> std::result::Result<Option<ResolvedSource>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: ResolvedSource,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.clone(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> std::result::Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn delete_template(&self, key: &TemplateKey) -> std::result::Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.retain(|k, _| &k.template_key != key);
        Ok(())
    }

    async fn flush(&self) -> std::result::Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.clear();
        Ok(())
    }
}

/// Read-through cache layer with stampede collapse and degraded pass-through.
///
/// Explicitly constructed and injected; tests instantiate isolated instances
/// instead of sharing ambient global state.
pub struct PromptCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    op_timeout: Duration,
    degraded: AtomicBool,
    // Bumped by every invalidation. A loader that was already running when
    // an invalidation landed read the store before the write it advertises,
    // so its artifact must not be written back.
    epoch: AtomicU64,
    // One gate per key collapses concurrent misses to a single loader run.
    // The map is bounded by the number of distinct templates.
    gates: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl PromptCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            op_timeout: Duration::from_millis(250),
            degraded: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Override the per-call backend deadline.
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Whether the backend has been observed failing. Health-probe signal,
    /// not an error state: operations keep succeeding via pass-through.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Get the cached artifact or compute it via `loader`. Concurrent misses
    /// for the same key run a single loader; the rest await its result.
    pub async fn get_or_load<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<ResolvedSource>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolvedSource>>,
    {
        if let Some(hit) = self.backend_get(key).await {
            return Ok(hit);
        }

        let gate = self.gate_for(key).await;
        let _held = gate.lock().await;

        // Another waiter may have populated the entry while we queued
        if let Some(hit) = self.backend_get(key).await {
            return Ok(hit);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let value = loader().await?;
        // An invalidation that landed while the loader ran makes this
        // artifact stale the moment it exists; serve it to this caller
        // but keep it out of the cache.
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.backend_put(key, value.clone()).await;
        }
        Ok(value)
    }

    /// Drop the entry for one key.
    pub async fn invalidate(&self, key: &CacheKey) {
        // Bump before deleting so a racing loader skips its write-back
        self.epoch.fetch_add(1, Ordering::SeqCst);
        match timeout(self.op_timeout, self.backend.delete(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.mark_degraded(&e.to_string()),
            Err(_) => self.mark_degraded("backend deadline exceeded"),
        }
    }

    /// Drop every entry for a template key, across all tenant scopes.
    pub async fn invalidate_template(&self, template_key: &TemplateKey) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        match timeout(self.op_timeout, self.backend.delete_template(template_key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.mark_degraded(&e.to_string()),
            Err(_) => self.mark_degraded("backend deadline exceeded"),
        }
    }

    /// Drop everything. Used at shutdown and by tests.
    pub async fn flush(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        match timeout(self.op_timeout, self.backend.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.mark_degraded(&e.to_string()),
            Err(_) => self.mark_degraded("backend deadline exceeded"),
        }
    }

    async fn gate_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates.entry(key.clone()).or_default().clone()
    }

    async fn backend_get(&self, key: &CacheKey) -> Option<ResolvedSource> {
        // A failed invalidation may have left stale entries behind; refuse
        // backend hits until one full flush succeeds.
        if self.is_degraded() {
            match timeout(self.op_timeout, self.backend.flush()).await {
                Ok(Ok(())) => self.degraded.store(false, Ordering::Relaxed),
                _ => return None,
            }
        }

        match timeout(self.op_timeout, self.backend.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                self.mark_degraded(&e.to_string());
                None
            }
            Err(_) => {
                self.mark_degraded("backend deadline exceeded");
                None
            }
        }
    }

    async fn backend_put(&self, key: &CacheKey, value: ResolvedSource) {
        match timeout(self.op_timeout, self.backend.put(key, value, self.ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.mark_degraded(&e.to_string()),
            Err(_) => self.mark_degraded("backend deadline exceeded"),
        }
    }

    fn mark_degraded(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(reason, "cache backend degraded, falling through to loader");
        }
    }
}
