//! Adaptive total-count estimation for the "X of Y" indicator.

use serde::{Deserialize, Serialize};

/// Tracks the estimated total library size while a scan is running.
///
/// With a user-provided estimate the tracker trusts it, except early in
/// the scan where reporting the full figure against a handful of
/// discovered files would be misleading — there it inflates the
/// discovered count 3x instead. Without one, the estimate grows from a
/// basis that only moves on >20% discovery increases, scaled
/// conservatively (3.0 while scanning, 1.2 once settled). Completing a
/// scan locks the estimate at the actual discovered count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateTracker {
    user_estimate: Option<u64>,
    discovered: u64,
    basis: u64,
    locked: Option<u64>,
}

impl EstimateTracker {
    pub fn new(user_estimate: Option<u64>) -> Self {
        Self {
            user_estimate,
            discovered: 0,
            basis: 0,
            locked: None,
        }
    }

    pub fn add_discovered(&mut self, count: u64) {
        self.discovered += count;
        // Grow the basis only on >20% increases to keep the indicator
        // from creeping on every folder.
        if self.discovered > self.basis + self.basis / 5 {
            self.basis = self.discovered;
        }
    }

    pub fn discovered(&self) -> u64 {
        self.discovered
    }

    pub fn current(&self, scanning: bool) -> u64 {
        if let Some(locked) = self.locked {
            return locked;
        }
        if let Some(user) = self.user_estimate {
            if scanning && self.discovered.saturating_mul(3) < user {
                return (self.discovered * 3).max(1);
            }
            return user.max(self.discovered);
        }
        let factor = if scanning { 3.0 } else { 1.2 };
        ((self.basis as f64 * factor) as u64).max(self.discovered).max(1)
    }

    /// Lock to the actual discovered count once scanning completes.
    pub fn lock(&mut self) {
        self.locked = Some(self.discovered.max(1));
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }
}
