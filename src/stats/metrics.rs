//! Statistics and metrics for the forwarding relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live relay counters
///
/// Written only by the relay loop; readable from any thread through the
/// relay handle.
#[derive(Debug)]
pub struct RelayStats {
    subscribes: AtomicU64,
    unsubscribes: AtomicU64,
    malformed_control: AtomicU64,
    data_received: AtomicU64,
    data_forwarded: AtomicU64,
    data_discarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    active_filters: AtomicU64,
    started_at: Instant,
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            subscribes: AtomicU64::new(0),
            unsubscribes: AtomicU64::new(0),
            malformed_control: AtomicU64::new(0),
            data_received: AtomicU64::new(0),
            data_forwarded: AtomicU64::new(0),
            data_discarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            active_filters: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn record_subscribe(&self, active_filters: usize) {
        self.subscribes.fetch_add(1, Ordering::Relaxed);
        self.active_filters
            .store(active_filters as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_unsubscribe(&self, active_filters: usize) {
        self.unsubscribes.fetch_add(1, Ordering::Relaxed);
        self.active_filters
            .store(active_filters as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_control.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self, bytes: usize) {
        self.data_received.fetch_add(1, Ordering::Relaxed);
        self.data_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self) {
        self.data_received.fetch_add(1, Ordering::Relaxed);
        self.data_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the counters were created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Copy the current values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            subscribes: self.subscribes.load(Ordering::Relaxed),
            unsubscribes: self.unsubscribes.load(Ordering::Relaxed),
            malformed_control: self.malformed_control.load(Ordering::Relaxed),
            data_received: self.data_received.load(Ordering::Relaxed),
            data_forwarded: self.data_forwarded.load(Ordering::Relaxed),
            data_discarded: self.data_discarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            active_filters: self.active_filters.load(Ordering::Relaxed),
            uptime: self.uptime(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Subscribe control frames applied
    pub subscribes: u64,
    /// Unsubscribe control frames applied
    pub unsubscribes: u64,
    /// Subscriber-facing frames dropped as malformed
    pub malformed_control: u64,
    /// Data frames read from the publisher-facing endpoint
    pub data_received: u64,
    /// Data frames written to the subscriber-facing endpoint
    pub data_forwarded: u64,
    /// Data frames with no matching filter
    pub data_discarded: u64,
    /// Payload bytes forwarded
    pub bytes_forwarded: u64,
    /// Distinct filters currently live
    pub active_filters: u64,
    /// Relay uptime
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let snapshot = RelayStats::new().snapshot();

        assert_eq!(snapshot.subscribes, 0);
        assert_eq!(snapshot.data_received, 0);
        assert_eq!(snapshot.bytes_forwarded, 0);
        assert_eq!(snapshot.active_filters, 0);
    }

    #[test]
    fn test_record_data() {
        let stats = RelayStats::new();
        stats.record_forwarded(10);
        stats.record_forwarded(5);
        stats.record_discarded();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.data_received, 3);
        assert_eq!(snapshot.data_forwarded, 2);
        assert_eq!(snapshot.data_discarded, 1);
        assert_eq!(snapshot.bytes_forwarded, 15);
    }

    #[test]
    fn test_record_control_tracks_filter_gauge() {
        let stats = RelayStats::new();
        stats.record_subscribe(1);
        stats.record_subscribe(2);
        stats.record_unsubscribe(1);
        stats.record_malformed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.subscribes, 2);
        assert_eq!(snapshot.unsubscribes, 1);
        assert_eq!(snapshot.active_filters, 1);
        assert_eq!(snapshot.malformed_control, 1);
    }
}
