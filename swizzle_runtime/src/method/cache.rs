//! Method resolution cache.
//!
//! Resolving a selector walks the class chain, which is O(depth). This cache
//! memoizes `(class, dispatch kind, selector) -> Imp` so repeated sends to the
//! same class are a single hash lookup.
//!
//! # Invalidation
//!
//! Any write to a class's method table invalidates entries for that class and
//! for every subclass, because subclasses cache inherited resolutions too.
//! The runtime takes care of this; callers never touch the cache directly.
//!
//! Handles already returned from the cache (or from `Runtime::resolve`) are
//! not recalled: a caller holding an `Imp` keeps calling the old body after a
//! replace.

use crate::method::imp::Imp;
use crate::object::class::{ClassId, DispatchKind};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use swizzle_core::Selector;

// =============================================================================
// Cache Key and Entry
// =============================================================================

type CacheKey = (ClassId, DispatchKind, Selector);

/// Cached resolution result.
#[derive(Clone, Debug)]
pub struct CachedMethod {
    /// The resolved implementation.
    pub imp: Imp,
    /// Class whose own table supplied the implementation.
    pub defining_class: ClassId,
}

// =============================================================================
// Method Cache
// =============================================================================

/// Thread-safe resolution cache with hit/miss/invalidation counters.
pub struct MethodCache {
    cache: RwLock<FxHashMap<CacheKey, CachedMethod>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl MethodCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Look up a cached resolution.
    #[inline]
    pub fn get(&self, class: ClassId, kind: DispatchKind, selector: Selector) -> Option<CachedMethod> {
        let result = self.cache.read().get(&(class, kind, selector)).cloned();
        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Current invalidation epoch. Read it before walking the class chain
    /// and pass it to [`insert`](Self::insert).
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.invalidations.load(Ordering::Acquire)
    }

    /// Record a resolution computed during `epoch`.
    ///
    /// Dropped if an invalidation happened since, so a lookup racing a
    /// mutation can never re-insert the displaced implementation.
    #[inline]
    pub fn insert(
        &self,
        class: ClassId,
        kind: DispatchKind,
        selector: Selector,
        method: CachedMethod,
        epoch: u64,
    ) -> bool {
        let mut guard = self.cache.write();
        if self.invalidations.load(Ordering::Acquire) != epoch {
            return false;
        }
        tracing::trace!(?class, ?kind, %selector, defining = ?method.defining_class, "method cache fill");
        guard.insert((class, kind, selector), method);
        true
    }

    /// Drop every entry belonging to one of `classes`.
    ///
    /// O(n) in cache size; mutations are rare compared to sends.
    pub fn invalidate_classes(&self, classes: &FxHashSet<ClassId>) {
        let mut guard = self.cache.write();
        let before = guard.len();
        guard.retain(|(class, _, _), _| !classes.contains(class));
        self.invalidations.fetch_add(1, Ordering::Release);
        tracing::trace!(
            classes = classes.len(),
            dropped = before - guard.len(),
            "method cache invalidated"
        );
    }

    /// Drop everything.
    pub fn clear(&self) {
        let mut guard = self.cache.write();
        guard.clear();
        self.invalidations.fetch_add(1, Ordering::Release);
    }

    /// (hits, misses, invalidations)
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.invalidations.load(Ordering::Relaxed),
        )
    }

    /// Hit rate as a percentage. 0.0 if nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MethodCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::imp::MethodLogic;
    use crate::method::signature::{Signature, ValueKind};
    use crate::value::Value;

    fn cached(defining: u32) -> CachedMethod {
        let imp = MethodLogic::constant(Signature::getter(ValueKind::Int), Value::Int(1))
            .build(Selector::unary("cached"))
            .unwrap();
        CachedMethod {
            imp,
            defining_class: ClassId::from_raw(defining),
        }
    }

    #[test]
    fn test_cache_miss_on_empty() {
        let cache = MethodCache::new();
        assert!(cache
            .get(ClassId::from_raw(1), DispatchKind::Instance, Selector::unary("cached"))
            .is_none());
        assert_eq!(cache.stats(), (0, 1, 0));
    }

    #[test]
    fn test_cache_hit_after_insert() {
        let cache = MethodCache::new();
        let sel = Selector::unary("cached");
        assert!(cache.insert(ClassId::from_raw(1), DispatchKind::Instance, sel, cached(1), cache.epoch()));

        assert!(cache.get(ClassId::from_raw(1), DispatchKind::Instance, sel).is_some());
        // Class-level table is a separate key space.
        assert!(cache.get(ClassId::from_raw(1), DispatchKind::Class, sel).is_none());
        assert_eq!(cache.hit_rate(), 50.0);
    }

    #[test]
    fn test_invalidate_only_named_classes() {
        let cache = MethodCache::new();
        let sel = Selector::unary("cached");
        let epoch = cache.epoch();
        cache.insert(ClassId::from_raw(1), DispatchKind::Instance, sel, cached(1), epoch);
        cache.insert(ClassId::from_raw(2), DispatchKind::Instance, sel, cached(1), epoch);
        cache.insert(ClassId::from_raw(3), DispatchKind::Instance, sel, cached(3), epoch);

        let mut doomed = FxHashSet::default();
        doomed.insert(ClassId::from_raw(1));
        doomed.insert(ClassId::from_raw(2));
        cache.invalidate_classes(&doomed);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(ClassId::from_raw(3), DispatchKind::Instance, sel).is_some());
        assert_eq!(cache.stats().2, 1);
    }

    #[test]
    fn test_clear() {
        let cache = MethodCache::new();
        cache.insert(
            ClassId::from_raw(9),
            DispatchKind::Class,
            Selector::unary("cached"),
            cached(9),
            cache.epoch(),
        );
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_epoch_insert_is_dropped() {
        let cache = MethodCache::new();
        let sel = Selector::unary("cached");
        let epoch = cache.epoch();
        cache.clear();

        assert!(!cache.insert(ClassId::from_raw(4), DispatchKind::Instance, sel, cached(4), epoch));
        assert!(cache.is_empty());
    }
}
