use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::plan::{ShapePlan, ShapePlanKey};

/// A thread-safe cache of shaping plans.
///
/// A font owner keeps one cache per face. Lookups hand out shared plans;
/// a miss builds the plan without holding the lock, so concurrent misses
/// on the same key may build twice. The first build to be stored wins and
/// the others are dropped.
#[derive(Default)]
pub struct ShapePlanCache {
    plans: Mutex<HashMap<ShapePlanKey, Arc<ShapePlan>>>,
}

impl ShapePlanCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached plan for `key`, building it on a miss.
    ///
    /// Returns `None` when the plan cannot be built.
    pub fn get_or_build(&self, key: &ShapePlanKey) -> Option<Arc<ShapePlan>> {
        if let Some(plan) = self.get(key) {
            return Some(plan);
        }

        let plan = Arc::new(key.build()?);

        let mut plans = self.plans.lock();
        if let Some(existing) = plans.get(key) {
            debug!("discarding a duplicate plan for {:?}", key.direction);
            return Some(existing.clone());
        }

        trace!("caching a plan for {:?} {:?}", key.direction, key.script);
        plans.insert(key.clone(), plan.clone());
        Some(plan)
    }

    /// Returns the cached plan for `key`.
    pub fn get(&self, key: &ShapePlanKey) -> Option<Arc<ShapePlan>> {
        self.plans.lock().get(key).cloned()
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached plan. Plans still in use stay alive.
    pub fn clear(&self) {
        self.plans.lock().clear();
    }
}

impl std::fmt::Debug for ShapePlanCache {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ShapePlanCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{script, Direction, Feature};

    fn key(features: &[Feature]) -> ShapePlanKey {
        ShapePlanKey::new(Direction::LeftToRight, Some(script::LATIN), None, features)
    }

    #[test]
    fn hit_returns_same_plan() {
        let cache = ShapePlanCache::new();
        let a = cache.get_or_build(&key(&[])).unwrap();
        let b = cache.get_or_build(&key(&[])).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn features_are_part_of_the_key() {
        let cache = ShapePlanCache::new();
        let liga_off: Feature = "-liga".parse().unwrap();
        let a = cache.get_or_build(&key(&[])).unwrap();
        let b = cache.get_or_build(&key(&[liga_off])).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn unbuildable_key_is_not_cached() {
        let cache = ShapePlanCache::new();
        let key = ShapePlanKey::new(Direction::Invalid, None, None, &[]);
        assert!(cache.get_or_build(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_builders_agree() {
        let cache = Arc::new(ShapePlanCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_build(&key(&[])).unwrap())
            })
            .collect();

        let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for plan in &plans[1..] {
            assert!(Arc::ptr_eq(&plans[0], plan));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_keeps_plans_in_use() {
        let cache = ShapePlanCache::new();
        let plan = cache.get_or_build(&key(&[])).unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(plan.direction(), Direction::LeftToRight);
    }
}
