use crate::error::PredictionError;
use crate::events::Timestamp;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// One resource-utilization sample from the telemetry backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSample {
    pub timestamp: Timestamp,
    /// CPU utilization in percent
    pub cpu_percent: f64,
    /// Memory utilization in percent
    pub memory_percent: f64,
    /// Requests per second
    pub request_rate: f64,
    /// Errors as a percentage of requests
    pub error_rate: f64,
    /// Average response time in milliseconds
    pub response_time_ms: f64,
    /// Concurrently open connections
    pub active_connections: u64,
}

/// Trait for fetching recent utilization samples from a telemetry backend
///
/// Substituting implementations of this trait is how a real telemetry store
/// is wired in without touching prediction or orchestration logic.
pub trait MetricsSource: Send + Sync {
    /// Fetch samples covering the most recent `hours` hours, oldest first
    fn fetch_recent<'a>(
        &'a self,
        hours: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ResourceSample>, PredictionError>> + Send + 'a>>;
}

/// Metrics source that always returns no samples
///
/// Used when no telemetry backend is configured; the predictor falls back to
/// its conservative default forecast.
#[derive(Debug, Default)]
pub struct NullMetricsSource;

impl MetricsSource for NullMetricsSource {
    fn fetch_recent<'a>(
        &'a self,
        _hours: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ResourceSample>, PredictionError>> + Send + 'a>>
    {
        Box::pin(async { Ok(Vec::new()) })
    }
}
