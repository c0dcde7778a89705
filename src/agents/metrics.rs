use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Default)]
struct Counters {
    calls: u64,
    successes: u64,
    failures: u64,
    cache_hits: u64,
    total_latency: Duration,
}

/// Rolling call metrics owned by one agent instance.
///
/// Counters only move forward until [`AgentMetrics::reset`] is called.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    counters: Mutex<Counters>,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, latency: Duration) {
        let mut c = self.counters.lock();
        c.calls += 1;
        c.successes += 1;
        c.total_latency += latency;
    }

    /// A cache hit also counts as a successful call
    pub fn record_cache_hit(&self, latency: Duration) {
        let mut c = self.counters.lock();
        c.calls += 1;
        c.successes += 1;
        c.cache_hits += 1;
        c.total_latency += latency;
    }

    pub fn record_failure(&self, latency: Duration) {
        let mut c = self.counters.lock();
        c.calls += 1;
        c.failures += 1;
        c.total_latency += latency;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = self.counters.lock();
        let ratio = |part: u64| if c.calls > 0 { part as f64 / c.calls as f64 } else { 0.0 };

        MetricsSnapshot {
            calls: c.calls,
            successes: c.successes,
            failures: c.failures,
            cache_hits: c.cache_hits,
            success_rate: ratio(c.successes),
            cache_hit_rate: ratio(c.cache_hits),
            avg_latency_ms: if c.calls > 0 {
                c.total_latency.as_secs_f64() * 1000.0 / c.calls as f64
            } else {
                0.0
            },
        }
    }

    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

/// Point-in-time copy of an agent's metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub success_rate: f64,
    pub cache_hit_rate: f64,
    pub avg_latency_ms: f64,
}
