use serde::{Deserialize, Serialize};

/// Bounds of a random pause, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    /// Swaps the bounds when given in the wrong order and clamps negatives to zero.
    pub fn new(min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min: min.max(0.0),
            max: max.max(0.0),
        }
    }
}

/// Limits on how far the review list is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestLimits {
    /// Maximum scroll cycles
    pub max_scrolls: usize,
    /// Stop once this many reviews are rendered; 0 means unbounded
    pub max_reviews: usize,
}

impl Default for HarvestLimits {
    fn default() -> Self {
        Self {
            max_scrolls: 50,
            max_reviews: 100,
        }
    }
}

/// Why the scroll loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Scroll height did not grow across a cycle and its retry
    Stable,
    MaxScrolls,
    MaxReviews,
    /// A scroll or height read failed; the list holds what loaded so far
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    /// Scroll cycles started
    pub cycles: usize,
    pub reason: StopReason,
}
