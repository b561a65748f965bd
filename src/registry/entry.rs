//! Subscription entry
//!
//! Per-filter state stored in the registry.

use super::frame::Filter;

/// Entry for a single live filter
///
/// `refcount` is at least 1 for as long as the entry exists; the registry
/// removes the entry instead of letting it reach zero.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    /// Subscription prefix
    pub filter: Filter,

    /// Number of outstanding subscribes for this filter
    refcount: u32,
}

impl SubscriptionEntry {
    /// Create an entry holding one subscription
    pub(super) fn new(filter: Filter) -> Self {
        Self {
            filter,
            refcount: 1,
        }
    }

    /// Current reference count
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub(super) fn acquire(&mut self) {
        self.refcount = self.refcount.saturating_add(1);
    }

    /// Drop one reference, returning true when none are left
    pub(super) fn release(&mut self) -> bool {
        self.refcount -= 1;
        self.refcount == 0
    }
}
