//! Planner metrics.
//!
//! Recorded through the `metrics` facade; a no-op unless the host process
//! installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Saliency
    pub const SALIENCY_CACHE_HITS_TOTAL: &str = "reel_saliency_cache_hits_total";
    pub const SALIENCY_CACHE_MISSES_TOTAL: &str = "reel_saliency_cache_misses_total";
    pub const SALIENCY_CACHE_EVICTIONS_TOTAL: &str = "reel_saliency_cache_evictions_total";
    pub const SALIENCY_FALLBACKS_TOTAL: &str = "reel_saliency_fallbacks_total";

    // Sequencing
    pub const ORDERING_FALLBACKS_TOTAL: &str = "reel_ordering_fallbacks_total";

    // Transitions
    pub const TRANSITION_DOWNGRADES_TOTAL: &str = "reel_transition_downgrades_total";

    // Duration safety net
    pub const DURATION_PADS_TOTAL: &str = "reel_duration_pads_total";
    pub const DURATION_PAD_SECONDS: &str = "reel_duration_pad_seconds";
}

pub fn record_cache_hit() {
    counter!(names::SALIENCY_CACHE_HITS_TOTAL).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::SALIENCY_CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_cache_eviction() {
    counter!(names::SALIENCY_CACHE_EVICTIONS_TOTAL).increment(1);
}

/// Record a saliency fallback (centered crop).
pub fn record_saliency_fallback(kind: &'static str) {
    let labels = [("kind", kind)];
    counter!(names::SALIENCY_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record a rejected candidate ordering.
pub fn record_ordering_fallback(reason: &'static str) {
    let labels = [("reason", reason)];
    counter!(names::ORDERING_FALLBACKS_TOTAL, &labels).increment(1);
}

/// Record a transition downgraded to a cut by a budget rule.
pub fn record_transition_downgrade(reason: &'static str) {
    let labels = [("reason", reason)];
    counter!(names::TRANSITION_DOWNGRADES_TOTAL, &labels).increment(1);
}

/// Record a last-frame pad applied by the duration safety net.
pub fn record_duration_pad(seconds: f64) {
    counter!(names::DURATION_PADS_TOTAL).increment(1);
    histogram!(names::DURATION_PAD_SECONDS).record(seconds);
}
