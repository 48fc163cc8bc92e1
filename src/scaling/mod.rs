//! Capacity-scaling prediction
//!
//! This module forecasts resource needs from utilization samples and derives
//! scaling recommendations from error signatures. It never blocks or fails
//! event processing; degraded inputs produce a conservative fallback.

mod metrics;
mod predictor;

pub use metrics::{MetricsSource, NullMetricsSource, ResourceSample};
pub use predictor::{
    Prediction, RecommendationSource, ResourceType, RiskLevel, ScalingAction, ScalingAdvisor,
    ScalingPredictor, ScalingRecommendation, TrendForecast, Urgency,
};
