//! Monitoring Module
//!
//! Request outcome counters and inference latency for the stats endpoint.

mod metrics;

pub use metrics::{InferenceStats, ServiceMetrics};
