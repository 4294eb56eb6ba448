//! Process-wide cache of translated logic libraries
//!
//! Each identifier owns one slot, an async once-cell. Concurrent requests for
//! the same identifier wait on the slot while a single caller fetches and
//! translates; distinct identifiers never block each other. A failed load
//! drops its slot, so the next request retries and unknown identifiers do
//! not accumulate.

use super::content::ContentProvider;
use super::translator::{CompiledLibrary, translate};
use crate::error::LibraryError;
use octofhir_cr_model::LibraryIdentifier;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Arc<CompiledLibrary>>>;

/// Statistics about cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from an already populated slot
    pub hits: u64,
    /// Requests that started a load
    pub misses: u64,
    /// Translations performed, successful or not
    pub translations: u64,
    /// Populated entries
    pub entries: usize,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

/// Cache mapping library identifiers to translated libraries
#[derive(Default)]
pub struct LibraryCache {
    slots: Mutex<HashMap<LibraryIdentifier, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
    translations: AtomicU64,
}

impl LibraryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a library, loading and translating it on first use.
    ///
    /// Providers are consulted in order; the first with content wins.
    pub async fn resolve(
        &self,
        identifier: &LibraryIdentifier,
        providers: &[Arc<dyn ContentProvider>],
    ) -> Result<Arc<CompiledLibrary>, LibraryError> {
        let slot = self.slot(identifier);
        if let Some(library) = slot.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("library cache hit: {}", identifier);
            return Ok(Arc::clone(library));
        }

        match slot.get_or_try_init(|| self.load(identifier, providers)).await {
            Ok(library) => Ok(Arc::clone(library)),
            Err(error) => {
                self.release(identifier, &slot);
                Err(error)
            }
        }
    }

    /// Whether a translated library is cached for the identifier
    pub fn contains(&self, identifier: &LibraryIdentifier) -> bool {
        self.slots
            .lock()
            .get(identifier)
            .is_some_and(|slot| slot.initialized())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            entries: self
                .slots
                .lock()
                .values()
                .filter(|slot| slot.initialized())
                .count(),
        }
    }

    fn slot(&self, identifier: &LibraryIdentifier) -> Slot {
        let mut slots = self.slots.lock();
        Arc::clone(
            slots
                .entry(identifier.clone())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Remove a slot that is still empty after a failed load
    fn release(&self, identifier: &LibraryIdentifier, slot: &Slot) {
        let mut slots = self.slots.lock();
        let stale = slots
            .get(identifier)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
        if stale {
            slots.remove(identifier);
        }
    }

    async fn load(
        &self,
        identifier: &LibraryIdentifier,
        providers: &[Arc<dyn ContentProvider>],
    ) -> Result<Arc<CompiledLibrary>, LibraryError> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("library cache miss: {}", identifier);

        let mut source = None;
        for provider in providers {
            if let Some(content) = provider.fetch(identifier).await? {
                source = Some(content);
                break;
            }
        }
        let source = source.ok_or_else(|| LibraryError::NotFound(identifier.clone()))?;

        self.translations.fetch_add(1, Ordering::Relaxed);
        let library = translate(&source).map_err(|e| LibraryError::Translation {
            identifier: identifier.clone(),
            message: e.message,
        })?;
        Ok(Arc::new(library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Provider serving fixed content after a delay, counting fetches
    struct SlowProvider {
        content: Option<String>,
        fetches: AtomicU64,
    }

    impl SlowProvider {
        fn new(content: Option<String>) -> Self {
            Self {
                content,
                fetches: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentProvider for SlowProvider {
        async fn fetch(&self, _: &LibraryIdentifier) -> Result<Option<String>, LibraryError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(self.content.clone())
        }
    }

    fn elm(name: &str) -> String {
        json!({
            "library": {
                "identifier": {"id": name, "version": "1.0.0"},
                "statements": {"def": [{"name": "Answer", "expression": {
                    "type": "Literal", "valueType": "{urn:hl7-org:elm-types:r1}Integer", "value": "42"
                }}]}
            }
        })
        .to_string()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolve_translates_once() {
        let cache = Arc::new(LibraryCache::new());
        let provider = Arc::new(SlowProvider::new(Some(elm("Shared"))));
        let providers: Vec<Arc<dyn ContentProvider>> = vec![provider.clone()];
        let id = LibraryIdentifier::new("Shared", Some("1.0.0"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let providers = providers.clone();
                let id = id.clone();
                tokio::spawn(async move { cache.resolve(&id, &providers).await })
            })
            .collect();

        let mut libraries = Vec::new();
        for task in tasks {
            libraries.push(task.await.unwrap().unwrap());
        }

        assert!(libraries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.stats().translations, 1);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hit_returns_same_instance() {
        let cache = LibraryCache::new();
        let providers: Vec<Arc<dyn ContentProvider>> =
            vec![Arc::new(SlowProvider::new(Some(elm("Cached"))))];
        let id = LibraryIdentifier::named("Cached");

        let first = cache.resolve(&id, &providers).await.unwrap();
        let second = cache.resolve(&id, &providers).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let cache = LibraryCache::new();
        let empty: Vec<Arc<dyn ContentProvider>> = vec![Arc::new(SlowProvider::new(None))];
        let id = LibraryIdentifier::named("Late");

        let missing = cache.resolve(&id, &empty).await;
        assert!(matches!(missing, Err(LibraryError::NotFound(_))));
        assert!(!cache.contains(&id));

        let available: Vec<Arc<dyn ContentProvider>> =
            vec![Arc::new(SlowProvider::new(Some(elm("Late"))))];
        assert!(cache.resolve(&id, &available).await.is_ok());
        assert!(cache.contains(&id));
    }

    #[tokio::test]
    async fn test_translation_failure_is_not_cached() {
        let cache = LibraryCache::new();
        let broken: Vec<Arc<dyn ContentProvider>> =
            vec![Arc::new(SlowProvider::new(Some("{\"library\": 1}".to_string())))];
        let id = LibraryIdentifier::named("Broken");

        let result = cache.resolve(&id, &broken).await;
        assert!(matches!(result, Err(LibraryError::Translation { .. })));
        assert!(!cache.contains(&id));
        assert_eq!(cache.stats().translations, 1);
        assert!(cache.slots.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_lookups_do_not_accumulate_slots() {
        let cache = LibraryCache::new();
        let empty: Vec<Arc<dyn ContentProvider>> = vec![Arc::new(SlowProvider::new(None))];

        for i in 0..5 {
            let id = LibraryIdentifier::named(format!("Unknown{}", i));
            assert!(cache.resolve(&id, &empty).await.is_err());
        }
        assert!(cache.slots.lock().is_empty());
        assert_eq!(cache.stats().misses, 5);

        let available: Vec<Arc<dyn ContentProvider>> =
            vec![Arc::new(SlowProvider::new(Some(elm("Known"))))];
        let known = LibraryIdentifier::named("Known");
        cache.resolve(&known, &available).await.unwrap();
        assert_eq!(cache.slots.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_first_provider_with_content_wins() {
        let cache = LibraryCache::new();
        let first = Arc::new(SlowProvider::new(None));
        let second = Arc::new(SlowProvider::new(Some(elm("Ordered"))));
        let providers: Vec<Arc<dyn ContentProvider>> = vec![first.clone(), second.clone()];

        cache
            .resolve(&LibraryIdentifier::named("Ordered"), &providers)
            .await
            .unwrap();
        assert_eq!(first.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(second.fetches.load(Ordering::SeqCst), 1);
    }
}
