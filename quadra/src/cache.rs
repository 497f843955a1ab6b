//! Process-wide generation caches and element pools.
//!
//! Entries are never evicted by [`UnboundedStore`]; a bounded policy can be swapped in through
//! [`CacheStore`] without touching the scene generators.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::dom::{ElementFactory, VisualElement};
use crate::theme::ThemeId;

/// Canonical identity of one generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backing storage of a [`GenerationCache`].
pub trait CacheStore<V> {
    fn get(&self, key: &CacheKey) -> Option<&V>;
    fn insert(&mut self, key: CacheKey, value: V);
    fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps every entry for the life of the process.
#[derive(Debug, Clone)]
pub struct UnboundedStore<V> {
    entries: HashMap<CacheKey, V>,
}

impl<V> Default for UnboundedStore<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> CacheStore<V> for UnboundedStore<V> {
    fn get(&self, key: &CacheKey) -> Option<&V> {
        self.entries.get(key)
    }

    fn insert(&mut self, key: CacheKey, value: V) {
        self.entries.insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Keyed storage of generated artifacts with hit/miss accounting.
#[derive(Debug, Clone)]
pub struct GenerationCache<V, S = UnboundedStore<V>> {
    name: &'static str,
    store: S,
    hits: u64,
    misses: u64,
    _value: std::marker::PhantomData<V>,
}

impl<V: Clone> GenerationCache<V, UnboundedStore<V>> {
    pub fn new(name: &'static str) -> Self {
        Self::with_store(name, UnboundedStore::default())
    }
}

impl<V: Clone, S: CacheStore<V>> GenerationCache<V, S> {
    pub fn with_store(name: &'static str, store: S) -> Self {
        Self {
            name,
            store,
            hits: 0,
            misses: 0,
            _value: std::marker::PhantomData,
        }
    }

    pub fn has(&self, key: &CacheKey) -> bool {
        self.store.contains(key)
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        match self.store.get(key) {
            Some(value) => {
                self.hits += 1;
                debug!("{} cache hit: {key}", self.name);
                Some(value.clone())
            }
            None => {
                self.misses += 1;
                debug!("{} cache miss: {key}", self.name);
                None
            }
        }
    }

    pub fn set(&mut self, key: CacheKey, value: V) {
        self.store.insert(key, value);
    }

    /// Returns the cached value for `key`, or runs `generate` and stores its output.
    ///
    /// The flag is `true` on a hit. `generate` is never called on a hit, and a failed
    /// generation leaves the cache untouched.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: &CacheKey,
        generate: impl FnOnce() -> Result<V, E>,
    ) -> Result<(V, bool), E> {
        if let Some(value) = self.get(key) {
            return Ok((value, true));
        }
        let value = generate()?;
        self.set(key.clone(), value.clone());
        Ok((value, false))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

// ── Element pools ───────────────────────────────────────────────────

/// Elements of one decoration category, built once and reattached on every later activation.
#[derive(Debug, Clone, Default)]
pub struct ElementPool {
    elements: Vec<VisualElement>,
    initialized: bool,
}

impl ElementPool {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn elements(&self) -> &[VisualElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn fill(&mut self, elements: Vec<VisualElement>) {
        self.elements = elements;
        self.initialized = true;
    }
}

/// All pools of one theme, by category.
#[derive(Debug, Clone, Default)]
pub struct ScenePool {
    categories: HashMap<&'static str, ElementPool>,
}

impl ScenePool {
    pub fn get(&self, category: &str) -> Option<&ElementPool> {
        self.categories.get(category)
    }

    pub fn total_elements(&self) -> usize {
        self.categories.values().map(ElementPool::len).sum()
    }
}

/// Pools for every theme plus the factory that mints element identities.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    scenes: HashMap<ThemeId, ScenePool>,
    factory: ElementFactory,
}

impl PoolRegistry {
    pub fn scene(&self, theme: ThemeId) -> Option<&ScenePool> {
        self.scenes.get(&theme)
    }

    pub fn elements_created(&self) -> u64 {
        self.factory.created()
    }

    /// Returns the pooled elements of `category`, building `count` of them on first use.
    ///
    /// The flag is `true` when the pool already existed.
    pub fn get_or_build(
        &mut self,
        theme: ThemeId,
        category: &'static str,
        count: usize,
        mut build: impl FnMut(usize, &mut VisualElement),
    ) -> (Vec<VisualElement>, bool) {
        let pool = self
            .scenes
            .entry(theme)
            .or_default()
            .categories
            .entry(category)
            .or_default();
        if pool.is_initialized() {
            debug!("{theme} pool hit: {category} x{}", pool.len());
            return (pool.elements.clone(), true);
        }
        let elements = (0..count)
            .map(|i| {
                let mut el = self.factory.create(category);
                build(i, &mut el);
                el
            })
            .collect();
        pool.fill(elements);
        debug!("{theme} pool built: {category} x{count}");
        (pool.elements.clone(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_runs_once_per_key() {
        let mut cache: GenerationCache<u32> = GenerationCache::new("test");
        let key = CacheKey::new("a");
        let mut calls = 0;
        for _ in 0..3 {
            let (value, _) = cache
                .get_or_try_insert_with(&key, || {
                    calls += 1;
                    Ok::<u32, ()>(7)
                })
                .expect("generate");
            assert_eq!(value, 7);
        }
        assert_eq!(calls, 1);
        assert_eq!((cache.hits(), cache.misses()), (2, 1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failed_generation_stores_nothing() {
        let mut cache: GenerationCache<u32> = GenerationCache::new("test");
        let key = CacheKey::new("broken");
        let result = cache.get_or_try_insert_with(&key, || Err("no surface"));
        assert_eq!(result, Err("no surface"));
        assert!(!cache.has(&key));
    }

    struct SingleSlot<V>(Option<(CacheKey, V)>);

    impl<V> CacheStore<V> for SingleSlot<V> {
        fn get(&self, key: &CacheKey) -> Option<&V> {
            self.0.as_ref().filter(|(k, _)| k == key).map(|(_, v)| v)
        }

        fn insert(&mut self, key: CacheKey, value: V) {
            self.0 = Some((key, value));
        }

        fn len(&self) -> usize {
            usize::from(self.0.is_some())
        }
    }

    #[test]
    fn injected_store_can_evict() {
        let mut cache = GenerationCache::with_store("single", SingleSlot(None));
        cache.set(CacheKey::new("a"), 1u8);
        cache.set(CacheKey::new("b"), 2u8);
        assert!(!cache.has(&CacheKey::new("a")));
        assert_eq!(cache.get(&CacheKey::new("b")), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn pools_build_once_and_keep_identities() {
        let mut pools = PoolRegistry::default();
        let (first, hit) = pools.get_or_build(ThemeId::IceTemple, "aurora", 3, |i, el| {
            el.set_seconds("animation-duration", 20.0 + i as f64 * 5.0);
        });
        assert!(!hit);
        let (again, hit) = pools.get_or_build(ThemeId::IceTemple, "aurora", 3, |_, _| {
            panic!("pooled elements must not be rebuilt")
        });
        assert!(hit);
        assert_eq!(first, again);
        assert_eq!(pools.elements_created(), 3);
        assert_eq!(
            pools.scene(ThemeId::IceTemple).map(ScenePool::total_elements),
            Some(3)
        );
    }
}
