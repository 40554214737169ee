//! Cache layer behavior: read-through, TTL, stampede collapse, degradation

use async_trait::async_trait;
use promptforge_registry::{
    CacheBackend, CacheError, CacheKey, MemoryCache, PromptCache, RegistryError, ResolvedSource,
    TemplateKey, TenantScope, VersionId,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn key(name: &str) -> CacheKey {
    CacheKey::new(name, TenantScope::Global)
}

fn artifact(source: &str) -> ResolvedSource {
    ResolvedSource {
        version_id: VersionId::generate(),
        source: source.to_string(),
    }
}

/// Backend that fails every call, simulating an unreachable cache service.
struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _: &CacheKey) -> Result<Option<ResolvedSource>, CacheError> {
        Err(CacheError("connection refused".to_string()))
    }

    async fn put(
        &self,
        _: &CacheKey,
        _: ResolvedSource,
        _: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError("connection refused".to_string()))
    }

    async fn delete(&self, _: &CacheKey) -> Result<(), CacheError> {
        Err(CacheError("connection refused".to_string()))
    }

    async fn delete_template(&self, _: &TemplateKey) -> Result<(), CacheError> {
        Err(CacheError("connection refused".to_string()))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Err(CacheError("connection refused".to_string()))
    }
}

#[tokio::test]
async fn read_through_loads_once_then_hits() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
    let loads = AtomicUsize::new(0);
    let value = artifact("hello");

    for _ in 0..3 {
        let got = cache
            .get_or_load(&key("greeting"), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(value.clone())
            })
            .await
            .unwrap();
        assert_eq!(got, value);
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_millis(30));
    let loads = AtomicUsize::new(0);

    for _ in 0..2 {
        cache
            .get_or_load(&key("greeting"), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(artifact("hello"))
            })
            .await
            .unwrap();
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;

    cache
        .get_or_load(&key("greeting"), || async {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(artifact("hello"))
        })
        .await
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_forces_reload() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
    let loads = AtomicUsize::new(0);
    let k = key("greeting");

    let load = || async {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok(artifact("hello"))
    };
    cache.get_or_load(&k, load).await.unwrap();
    cache.invalidate(&k).await;
    cache.get_or_load(&k, load).await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_template_sweeps_all_scopes() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
    let loads = AtomicUsize::new(0);
    let global = CacheKey::new("greeting", TenantScope::Global);
    let tenant = CacheKey::new("greeting", TenantScope::Tenant("acme".to_string()));

    let load = || async {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok(artifact("hello"))
    };
    cache.get_or_load(&global, load).await.unwrap();
    cache.get_or_load(&tenant, load).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);

    cache.invalidate_template(&TemplateKey::from("greeting")).await;

    cache.get_or_load(&global, load).await.unwrap();
    cache.get_or_load(&tenant, load).await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn concurrent_misses_collapse_to_one_loader() {
    let cache = Arc::new(PromptCache::new(
        Arc::new(MemoryCache::new()),
        Duration::from_secs(60),
    ));
    let loads = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let loads = Arc::clone(&loads);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_load(&key("greeting"), || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    // Hold the gate long enough for every task to queue up
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(artifact("hello"))
                })
                .await
                .unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn invalidation_during_load_is_not_overwritten() {
    let cache = Arc::new(PromptCache::new(
        Arc::new(MemoryCache::new()),
        Duration::from_secs(60),
    ));
    let k = key("greeting");

    // A slow loader that read the store before the write behind the
    // invalidation below
    let reader = {
        let cache = Arc::clone(&cache);
        let k = k.clone();
        tokio::spawn(async move {
            cache
                .get_or_load(&k, || async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(artifact("old"))
                })
                .await
                .unwrap()
        })
    };

    // The invalidation lands mid-load
    tokio::time::sleep(Duration::from_millis(30)).await;
    cache.invalidate(&k).await;

    // The in-flight caller still gets what it loaded
    assert_eq!(reader.await.unwrap().source, "old");

    // But the stale artifact was not written back: the next read reloads
    let got = cache
        .get_or_load(&k, || async { Ok(artifact("new")) })
        .await
        .unwrap();
    assert_eq!(got.source, "new");
}

#[tokio::test]
async fn unavailable_backend_degrades_to_pass_through() {
    let cache = PromptCache::new(Arc::new(FailingBackend), Duration::from_secs(60));
    let loads = AtomicUsize::new(0);

    for _ in 0..3 {
        let got = cache
            .get_or_load(&key("greeting"), || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok(artifact("hello"))
            })
            .await
            .unwrap();
        assert_eq!(got.source, "hello");
    }

    // Every call fell through to the loader, none errored
    assert_eq!(loads.load(Ordering::SeqCst), 3);
    assert!(cache.is_degraded());
}

#[tokio::test]
async fn loader_errors_propagate_unwrapped() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));

    let err = cache
        .get_or_load(&key("nope"), || async {
            Err(RegistryError::TemplateNotFound("nope".to_string()))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RegistryError::TemplateNotFound(_)));
}

#[tokio::test]
async fn flush_empties_the_cache() {
    let cache = PromptCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
    let loads = AtomicUsize::new(0);

    let load = || async {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok(artifact("hello"))
    };
    cache.get_or_load(&key("greeting"), load).await.unwrap();
    cache.flush().await;
    cache.get_or_load(&key("greeting"), load).await.unwrap();

    assert_eq!(loads.load(Ordering::SeqCst), 2);
}
