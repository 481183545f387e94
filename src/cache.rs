//! Analyzed-template cache keyed by content hash.
//!
//! Analysis walks every layout and theme part of the container; callers that
//! generate several decks from the same template should not pay that cost per
//! run. The cache keys on a SHA-256 of the template bytes, so a template
//! edited in place reads as a new entry, and hands out `Arc`s so concurrent
//! runs share one model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::template::TemplateModel;

/// Content hash identifying one template.
pub type TemplateKey = [u8; 32];

/// How long a cached model stays valid.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Hash template bytes into a cache key.
pub fn template_key(bytes: &[u8]) -> TemplateKey {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

struct CacheEntry {
    model: Arc<TemplateModel>,
    inserted: Instant,
}

impl CacheEntry {
    fn expired(&self, ttl: Duration) -> bool {
        self.inserted.elapsed() >= ttl
    }
}

/// Time-bounded map from template hash to analyzed model.
///
/// Reads take a shared lock; expired entries are swept whenever a new model
/// is inserted, so an idle cache holds stale entries but never serves them.
pub struct ModelCache {
    ttl: Duration,
    entries: RwLock<HashMap<TemplateKey, CacheEntry>>,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ModelCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a model, ignoring entries past their TTL.
    pub fn get(&self, key: &TemplateKey) -> Option<Arc<TemplateModel>> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.expired(self.ttl))
            .map(|entry| Arc::clone(&entry.model))
    }

    /// Insert a model, sweeping expired entries while the write lock is held.
    pub fn insert(&self, key: TemplateKey, model: Arc<TemplateModel>) {
        let mut entries = self.entries.write();
        entries.retain(|_, entry| !entry.expired(self.ttl));
        entries.insert(
            key,
            CacheEntry {
                model,
                inserted: Instant::now(),
            },
        );
    }

    /// Return the cached model for `key` or build, cache, and return a fresh
    /// one. The build runs outside any lock; when two callers race, both
    /// builds run and the later insert wins, which is harmless for a pure
    /// analysis result.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: TemplateKey,
        build: impl FnOnce() -> Result<TemplateModel, E>,
    ) -> Result<Arc<TemplateModel>, E> {
        if let Some(model) = self.get(&key) {
            log::trace!("template cache hit");
            return Ok(model);
        }
        let model = Arc::new(build()?);
        self.insert(key, Arc::clone(&model));
        Ok(model)
    }

    /// Number of entries, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::opc::OpcPackage;
    use crate::template;

    fn analyzed_model() -> TemplateModel {
        let bytes = fixtures::template_pptx();
        let pkg = OpcPackage::from_bytes(&bytes).unwrap();
        template::analyze(&pkg).unwrap()
    }

    #[test]
    fn test_key_is_stable_and_content_sensitive() {
        let a = template_key(b"alpha");
        assert_eq!(a, template_key(b"alpha"));
        assert_ne!(a, template_key(b"beta"));
    }

    #[test]
    fn test_hit_returns_shared_model() {
        let cache = ModelCache::new(DEFAULT_TTL);
        let key = template_key(b"t");

        let first = cache
            .get_or_try_insert_with::<()>(key, || Ok(analyzed_model()))
            .unwrap();
        let second = cache
            .get_or_try_insert_with::<()>(key, || panic!("must not rebuild on a hit"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_build_error_is_passed_through_and_not_cached() {
        let cache = ModelCache::new(DEFAULT_TTL);
        let key = template_key(b"t");

        let err = cache.get_or_try_insert_with(key, || Err::<TemplateModel, _>("nope"));
        assert_eq!(err.unwrap_err(), "nope");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_not_served() {
        let cache = ModelCache::new(Duration::from_millis(1));
        let key = template_key(b"t");
        cache.insert(key, Arc::new(analyzed_model()));

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_insert_sweeps_expired_entries() {
        let cache = ModelCache::new(Duration::from_millis(1));
        cache.insert(template_key(b"old"), Arc::new(analyzed_model()));
        std::thread::sleep(Duration::from_millis(5));

        cache.insert(template_key(b"new"), Arc::new(analyzed_model()));
        assert_eq!(cache.len(), 1);
    }
}
