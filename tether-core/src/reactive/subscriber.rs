//! Subscriber identity.
//!
//! A subscriber is anything (usually a presenter or a logic component) that
//! registers handlers against a model's observable fields. The reactive layer
//! only needs to tell subscribers apart so their registrations can be removed
//! in bulk, so a subscriber is represented here by an opaque ID.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each presenter or logic component should create one ID when it is
/// constructed and report the same ID for its whole lifetime. Registrations
/// recorded under an ID are removed together by
/// [`Bindings::remove_all_subscriptions`](crate::binding::Bindings::remove_all_subscriptions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn display_includes_raw_value() {
        let id = SubscriberId::new();
        assert_eq!(id.to_string(), format!("subscriber#{}", id.raw()));
    }
}
