//! Subscription registry implementation

use std::collections::HashMap;

use super::entry::SubscriptionEntry;
use super::frame::{ControlFrame, ControlKind, Filter};

/// Effect of applying a control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// First subscription to this filter; a new entry was created
    Created,
    /// Duplicate subscription; refcount went up
    Incremented,
    /// Unsubscribe with other subscriptions still outstanding
    Decremented,
    /// Last unsubscribe; the entry is gone
    Removed,
    /// Unsubscribe for a filter nobody holds
    Ignored,
}

/// Aggregate, reference-counted set of subscription filters
///
/// Not synchronized: the relay loop is the only owner, which is what makes a
/// control frame visible to every data frame that loop processes afterwards.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    /// Map of filter bytes to entry
    entries: HashMap<Filter, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a subscribe or unsubscribe
    pub fn apply_control(&mut self, frame: &ControlFrame) -> ControlOutcome {
        match frame.kind {
            ControlKind::Subscribe => {
                if let Some(entry) = self.entries.get_mut(&frame.filter) {
                    entry.acquire();
                    ControlOutcome::Incremented
                } else {
                    self.entries.insert(
                        frame.filter.clone(),
                        SubscriptionEntry::new(frame.filter.clone()),
                    );
                    ControlOutcome::Created
                }
            }
            ControlKind::Unsubscribe => {
                let Some(entry) = self.entries.get_mut(&frame.filter) else {
                    return ControlOutcome::Ignored;
                };

                if entry.release() {
                    self.entries.remove(&frame.filter);
                    ControlOutcome::Removed
                } else {
                    ControlOutcome::Decremented
                }
            }
        }
    }

    /// Check if any live filter matches `topic`
    ///
    /// An empty registry matches nothing, not even the empty topic.
    pub fn matches(&self, topic: &[u8]) -> bool {
        self.entries.keys().any(|filter| filter.matches(topic))
    }

    /// Reference count for a filter (0 if absent)
    pub fn refcount(&self, filter: &Filter) -> u32 {
        self.entries.get(filter).map_or(0, SubscriptionEntry::refcount)
    }

    /// Check if a filter has a live entry
    pub fn contains(&self, filter: &Filter) -> bool {
        self.entries.contains_key(filter)
    }

    /// Iterate over live entries
    pub fn entries(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.values()
    }

    /// Number of distinct live filters
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no filter is live
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
