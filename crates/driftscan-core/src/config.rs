//! Engine configuration and constants.

use serde::{Deserialize, Serialize};

use crate::errors::{DriftscanError, Result};

/// Default neighbourhood radius in `(time, channel)` units.
///
/// Matches the scale of typical trigger-primitive streams once timestamps
/// have been divided down by 100 on input.
pub const DEFAULT_EPS: f64 = 10.0;

/// Default minimum number of hits (including the hit itself) within `eps`
/// for a hit to qualify as a core point.
pub const DEFAULT_MIN_PTS: usize = 2;

/// Trim retains hits up to this many multiples of `eps` behind the earliest
/// hit still needed by an active cluster.
pub const TRIM_LOOKBACK_FACTOR: f64 = 10.0;

/// Clustering parameters for [`IncrementalDbscan`](crate::IncrementalDbscan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbscanConfig {
    /// Neighbourhood radius; two hits are neighbours when their Euclidean
    /// distance in the `(time, channel)` plane is strictly below this.
    pub eps: f64,
    /// Minimum count of hits (including self) within `eps` for a core point.
    pub min_pts: usize,
    /// Fixed hit-arena capacity. `None` lets the arena grow on demand.
    pub arena_capacity: Option<usize>,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            min_pts: DEFAULT_MIN_PTS,
            arena_capacity: None,
        }
    }
}

impl DbscanConfig {
    /// Create a configuration with an unbounded arena.
    pub fn new(eps: f64, min_pts: usize) -> Self {
        Self {
            eps,
            min_pts,
            arena_capacity: None,
        }
    }

    /// Cap the hit arena at `capacity` live hits.
    pub fn with_arena_capacity(mut self, capacity: usize) -> Self {
        self.arena_capacity = Some(capacity);
        self
    }

    /// Check the parameters for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !(self.eps > 0.0) || !self.eps.is_finite() {
            return Err(DriftscanError::config(format!(
                "eps must be positive and finite, got {}",
                self.eps
            )));
        }
        if self.min_pts == 0 {
            return Err(DriftscanError::config("min_pts must be at least 1"));
        }
        if self.arena_capacity == Some(0) {
            return Err(DriftscanError::config("arena capacity must be nonzero"));
        }
        Ok(())
    }
}
