//! Request metrics: the provider seam and an in-process collector
//!
//! The monitor pulls a [`RequestMetrics`] reading once per degradation tick.
//! Hosts can implement [`MetricsProvider`] over whatever they already track,
//! or feed a [`RequestStatsCollector`] from their request middleware.

use crate::error::Result;
use crate::monitoring::system::MemoryIntrospector;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Point-in-time request performance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetrics {
    pub avg_response_time_ms: f64,
    pub requests_per_second: f64,
    pub error_rate_pct: f64,
    pub memory_usage_mb: f64,
}

/// Pull-based source of request metrics
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    async fn current_metrics(&self) -> Result<RequestMetrics>;
}

#[derive(Debug, Clone, Copy)]
struct RequestSample {
    at: Instant,
    latency: Duration,
    failed: bool,
}

/// Sliding-window request statistics
pub struct RequestStatsCollector {
    window: Duration,
    samples: Mutex<VecDeque<RequestSample>>,
    memory: Option<Arc<dyn MemoryIntrospector>>,
}

impl RequestStatsCollector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: Mutex::new(VecDeque::new()),
            memory: None,
        }
    }

    /// Report process memory alongside the request figures
    pub fn with_memory_introspector(mut self, memory: Arc<dyn MemoryIntrospector>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Record one completed request
    pub fn record(&self, latency: Duration, failed: bool) {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        samples.push_back(RequestSample {
            at: now,
            latency,
            failed,
        });
        Self::evict(&mut samples, now, self.window);
    }

    pub fn sample_count(&self) -> usize {
        let mut samples = self.samples.lock();
        Self::evict(&mut samples, Instant::now(), self.window);
        samples.len()
    }

    /// Compute request figures over the current window
    pub fn snapshot(&self) -> RequestMetrics {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        Self::evict(&mut samples, now, self.window);

        if samples.is_empty() {
            return RequestMetrics::default();
        }

        let count = samples.len() as f64;
        let total_ms: f64 = samples
            .iter()
            .map(|s| s.latency.as_secs_f64() * 1000.0)
            .sum();
        let failures = samples.iter().filter(|s| s.failed).count() as f64;

        RequestMetrics {
            avg_response_time_ms: total_ms / count,
            requests_per_second: count / self.window.as_secs_f64().max(f64::EPSILON),
            error_rate_pct: failures / count * 100.0,
            memory_usage_mb: 0.0,
        }
    }

    fn evict(samples: &mut VecDeque<RequestSample>, now: Instant, window: Duration) {
        while let Some(front) = samples.front() {
            if now.duration_since(front.at) > window {
                samples.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl MetricsProvider for RequestStatsCollector {
    async fn current_metrics(&self) -> Result<RequestMetrics> {
        let mut metrics = self.snapshot();
        if let Some(memory) = &self.memory {
            metrics.memory_usage_mb = memory.sample()?.rss_mb();
        }
        Ok(metrics)
    }
}
