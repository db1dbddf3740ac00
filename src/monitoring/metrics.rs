//! Service metrics
//!
//! Request outcome counters and a rolling inference latency window.
//! Counters are lock-free atomics; the latency window lives behind a
//! single lock so `record_latency` never takes more than one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

const DEFAULT_WINDOW: usize = 1024;

/// Point-in-time view of the service counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_requests: u64,
    pub classified: u64,
    pub rejected_inputs: u64,
    pub inference_failures: u64,
    pub logging_failures: u64,
    pub runs_logged: u64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub uptime_secs: u64,
}

/// Counters shared by the pipeline, the logger and the HTTP layer
pub struct ServiceMetrics {
    window_size: usize,
    latencies: RwLock<VecDeque<f64>>,

    total_requests: AtomicU64,
    classified: AtomicU64,
    rejected_inputs: AtomicU64,
    inference_failures: AtomicU64,
    logging_failures: AtomicU64,
    runs_logged: AtomicU64,

    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            latencies: RwLock::new(VecDeque::with_capacity(window_size)),
            total_requests: AtomicU64::new(0),
            classified: AtomicU64::new(0),
            rejected_inputs: AtomicU64::new(0),
            inference_failures: AtomicU64::new(0),
            logging_failures: AtomicU64::new(0),
            runs_logged: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful classification and its end-to-end latency
    pub fn record_classified(&self, latency_ms: f64) {
        self.classified.fetch_add(1, Ordering::Relaxed);
        let mut window = self.latencies.write();
        window.push_back(latency_ms);
        if window.len() > self.window_size {
            window.pop_front();
        }
    }

    pub fn record_rejected(&self) {
        self.rejected_inputs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_inference_failure(&self) {
        self.inference_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_logging_failure(&self) {
        self.logging_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_logged(&self) {
        self.runs_logged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn logging_failures(&self) -> u64 {
        self.logging_failures.load(Ordering::Relaxed)
    }

    pub fn runs_logged(&self) -> u64 {
        self.runs_logged.load(Ordering::Relaxed)
    }

    /// Mean latency over the window, 0 when empty
    pub fn avg_latency(&self) -> f64 {
        let window = self.latencies.read();
        if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        }
    }

    /// Nearest-rank percentile over the window (quickselect)
    pub fn percentile_latency(&self, percentile: f64) -> f64 {
        let mut data: Vec<f64> = self.latencies.read().iter().copied().collect();
        if data.is_empty() {
            return 0.0;
        }
        let idx = ((percentile.clamp(0.0, 100.0) / 100.0) * (data.len() - 1) as f64) as usize;
        let idx = idx.min(data.len() - 1);
        data.select_nth_unstable_by(idx, |a, b| {
            a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
        });
        data[idx]
    }

    pub fn snapshot(&self) -> InferenceStats {
        InferenceStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            classified: self.classified.load(Ordering::Relaxed),
            rejected_inputs: self.rejected_inputs.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            logging_failures: self.logging_failures.load(Ordering::Relaxed),
            runs_logged: self.runs_logged.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency(),
            p95_latency_ms: self.percentile_latency(95.0),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMetrics")
            .field("window_size", &self.window_size)
            .field("stats", &self.snapshot())
            .finish()
    }
}
