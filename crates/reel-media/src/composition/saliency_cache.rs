//! Bounded FIFO cache of saliency plans.
//!
//! Keyed by (image id, target aspect rounded to 4 decimals). Owned by the
//! planner context; a service sharing one planner across concurrent jobs
//! must wrap it in a mutex.

use std::collections::{HashMap, VecDeque};

use reel_models::aspect::rounded_aspect_key;
use reel_models::SaliencyPlan;
use tracing::debug;

use crate::metrics;

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SaliencyKey {
    pub image_id: String,
    pub aspect_key: i64,
}

impl SaliencyKey {
    pub fn new(image_id: impl Into<String>, target_aspect: f64) -> Self {
        Self {
            image_id: image_id.into(),
            aspect_key: rounded_aspect_key(target_aspect),
        }
    }
}

#[derive(Debug)]
pub struct SaliencyCache {
    capacity: usize,
    entries: HashMap<SaliencyKey, SaliencyPlan>,
    order: VecDeque<SaliencyKey>,
}

impl SaliencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Key used when plans are persisted outside the process.
    pub fn storage_key(image_id: &str, target_aspect: f64) -> String {
        format!("{}@{:.4}", image_id, target_aspect)
    }

    pub fn get(&self, key: &SaliencyKey) -> Option<&SaliencyPlan> {
        let hit = self.entries.get(key);
        if hit.is_some() {
            metrics::record_cache_hit();
        } else {
            metrics::record_cache_miss();
        }
        hit
    }

    /// Insert a plan, evicting the oldest entries past capacity.
    ///
    /// Re-inserting an existing key replaces the plan without refreshing
    /// its age.
    pub fn insert(&mut self, key: SaliencyKey, plan: SaliencyPlan) {
        if self.entries.insert(key.clone(), plan).is_none() {
            self.order.push_back(key);
        }

        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            metrics::record_cache_eviction();
            debug!(image_id = %oldest.image_id, aspect_key = oldest.aspect_key, "Evicted saliency plan");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
