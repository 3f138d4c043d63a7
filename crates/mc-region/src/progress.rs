//! Progress reporting for long operations.
//!
//! Repair, collapse and bulk copies are exposed as finite, single-pass
//! iterators of [`Progress`]. The caller pulls items to drive the work and
//! may stop at any point; nothing is rolled back.

use core::fmt;

/// One step of a long-running operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Units completed so far.
    pub current: usize,
    /// Total units in the current phase.
    pub max: usize,
    /// Human-readable description of the phase.
    pub message: String,
}

impl Progress {
    #[must_use]
    pub fn new(current: usize, max: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            max,
            message: message.into(),
        }
    }

    /// Completed fraction in `[0, 1]`; empty phases count as done.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.max == 0 {
            1.0
        } else {
            (self.current as f32 / self.max as f32).min(1.0)
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.current, self.max, self.message)
    }
}
