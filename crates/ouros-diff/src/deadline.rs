//! Deadline-scoped cancellation for every bounded stage of an iteration.
//!
//! Deadlines nest: the oracle stage's outer deadline is created first and the
//! primary execution runs under a child of it, so a child can never outlive
//! its parent.

use std::time::{Duration, Instant};

/// Fallback horizon when `now + duration` overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// An absolute point in time after which a stage's outcome is "don't care".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `duration` from now.
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(duration)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self { at }
    }

    /// Creates a nested deadline that expires after `duration` or when `self`
    /// expires, whichever comes first.
    #[must_use]
    pub fn child(self, duration: Duration) -> Self {
        self.min(Self::after(duration))
    }

    /// Time left before expiry, or `None` once the deadline has passed.
    #[must_use]
    pub fn remaining(self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|remaining| !remaining.is_zero())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(self) -> bool {
        self.remaining().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_never_outlives_parent() {
        let parent = Deadline::after(Duration::from_millis(50));
        let child = parent.child(Duration::from_secs(60));
        assert_eq!(child, parent);
    }

    #[test]
    fn shorter_child_wins() {
        let parent = Deadline::after(Duration::from_secs(60));
        let child = parent.child(Duration::from_millis(10));
        assert!(child < parent);
    }

    #[test]
    fn zero_duration_is_already_expired() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), None);
    }

    #[test]
    fn huge_duration_does_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.expired());
    }
}
