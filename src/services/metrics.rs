use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the card engine
#[derive(Debug, Default)]
pub struct Metrics {
    /// Spawns published to a chat
    pub spawns_published: AtomicU64,
    /// Spawns rolled back because the publish failed
    pub publish_failures: AtomicU64,
    /// Successful claims
    pub claims: AtomicU64,
    /// Claims that found no live spawn
    pub claims_missed: AtomicU64,
    /// Open spawns dropped by the sweep
    pub spawns_expired: AtomicU64,
    pub merges: AtomicU64,
    /// Completed sales and settled auctions
    pub trades: AtomicU64,
    /// Ended auctions closed by settlement, sold or expired
    pub auctions_settled: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub spawns_published: u64,
    pub publish_failures: u64,
    pub claims: u64,
    pub claims_missed: u64,
    pub spawns_expired: u64,
    pub merges: u64,
    pub trades: u64,
    pub auctions_settled: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            spawns_published: self.spawns_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            claims: self.claims.load(Ordering::Relaxed),
            claims_missed: self.claims_missed.load(Ordering::Relaxed),
            spawns_expired: self.spawns_expired.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            auctions_settled: self.auctions_settled.load(Ordering::Relaxed),
        }
    }

    /// One-line status for logs
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "spawns={} publish_failures={} claims={} missed={} expired={} merges={} trades={} auctions={}",
            s.spawns_published,
            s.publish_failures,
            s.claims,
            s.claims_missed,
            s.spawns_expired,
            s.merges,
            s.trades,
            s.auctions_settled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = Metrics::new();
        Metrics::inc(&metrics.claims);
        Metrics::add(&metrics.spawns_expired, 3);
        Metrics::inc(&metrics.auctions_settled);

        let snap = metrics.snapshot();
        assert_eq!(snap.claims, 1);
        assert_eq!(snap.spawns_expired, 3);
        assert_eq!(snap.auctions_settled, 1);
        assert!(metrics.summary().contains("expired=3"));
        assert!(metrics.summary().ends_with("auctions=1"));
    }
}
