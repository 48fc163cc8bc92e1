use crate::events::{ErrorCategory, ErrorSeverity, Timestamp};
use crate::scaling::metrics::ResourceSample;
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Resource dimension a forecast or recommendation applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Compute,
    Memory,
    Database,
    Cache,
    Network,
    Requests,
}

/// Suggested capacity change direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    Maintain,
    Optimize,
}

/// How urgently a recommendation should be acted on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// Forecast risk for a resource dimension or a prediction as a whole
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RecommendationSource {
    /// Derived from utilization metric trends
    Metrics,
    /// Derived from an error signature during event processing
    ErrorPattern,
}

/// One suggested capacity change
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRecommendation {
    pub id: String,
    pub resource_type: ResourceType,
    pub action: ScalingAction,
    /// Confidence in the recommendation, in [0, 1]
    pub confidence: f64,
    /// Expected improvement in percent; negative for cost-motivated scale-down
    pub estimated_impact: f64,
    pub urgency: Urgency,
    pub reason: String,
    pub current_value: f64,
    pub target_value: f64,
    pub unit: String,
    pub source: RecommendationSource,
}

/// Trend forecast for one resource dimension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendForecast {
    pub resource_type: ResourceType,
    pub current_load: f64,
    pub predicted_load: f64,
    /// Lower and upper bound of the predicted load
    pub confidence_interval: (f64, f64),
    pub risk_level: RiskLevel,
}

/// Full prediction returned by `analyze_and_predict`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub prediction_id: String,
    pub timestamp: Timestamp,
    pub time_horizon_hours: u32,
    pub forecasts: Vec<TrendForecast>,
    pub recommendations: Vec<ScalingRecommendation>,
    pub overall_risk: RiskLevel,
}

/// Trait for the scaling-prediction stage of the processing pipeline
pub trait ScalingAdvisor: Send + Sync {
    /// Forecast resource needs from historical utilization samples
    fn analyze_and_predict(
        &self,
        samples: &[ResourceSample],
        time_horizon_hours: u32,
    ) -> Prediction;

    /// Derive recommendations purely from an error signature
    ///
    /// Used inline during event processing, where utilization metrics are
    /// not available synchronously. Infallible; returns an empty list rather
    /// than erroring.
    fn scaling_for_error_pattern(
        &self,
        category: ErrorCategory,
        severity: ErrorSeverity,
        observed_error_rate: f64,
        endpoint: Option<&str>,
    ) -> Vec<ScalingRecommendation>;
}

const TREND_SAMPLE_COUNT: usize = 10;

/// Forecasts resource needs from utilization samples and error signatures
///
/// Stateless; all inputs arrive per call, so a single instance is safe to
/// share across concurrent processing.
#[derive(Debug, Default)]
pub struct ScalingPredictor;

impl ScalingPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Forecast resource needs from historical utilization samples
    ///
    /// Fits a linear trend per resource dimension over the most recent
    /// samples and derives recommendations from the predicted loads. With
    /// fewer than two samples a conservative fallback prediction is returned
    /// instead of an error.
    pub fn analyze_and_predict(
        &self,
        samples: &[ResourceSample],
        time_horizon_hours: u32,
    ) -> Prediction {
        let prediction_id = format!("prediction-{}", Utc::now().timestamp_millis());
        let now = Utc::now();

        if samples.len() < 2 {
            debug!("Insufficient samples ({}), using fallback prediction", samples.len());
            return Self::fallback_prediction(prediction_id, now, time_horizon_hours);
        }

        let recent = &samples[samples.len().saturating_sub(TREND_SAMPLE_COUNT)..];
        let latest = &recent[recent.len() - 1];

        let cpu_trend = Self::linear_trend(recent.iter().map(|s| s.cpu_percent));
        let memory_trend = Self::linear_trend(recent.iter().map(|s| s.memory_percent));
        let request_trend = Self::linear_trend(recent.iter().map(|s| s.request_rate));

        // Horizon-proportional extrapolation, normalized to a 24-hour scale
        let time_factor = f64::from(time_horizon_hours) / 24.0;

        let forecasts = vec![
            TrendForecast {
                resource_type: ResourceType::Compute,
                current_load: latest.cpu_percent,
                predicted_load: latest.cpu_percent + cpu_trend * time_factor * 10.0,
                confidence_interval: (
                    (latest.cpu_percent + cpu_trend * time_factor * 5.0).max(0.0),
                    (latest.cpu_percent + cpu_trend * time_factor * 15.0).min(100.0),
                ),
                risk_level: Self::risk_level(cpu_trend, latest.cpu_percent),
            },
            TrendForecast {
                resource_type: ResourceType::Memory,
                current_load: latest.memory_percent,
                predicted_load: latest.memory_percent + memory_trend * time_factor * 8.0,
                confidence_interval: (
                    (latest.memory_percent + memory_trend * time_factor * 4.0).max(0.0),
                    (latest.memory_percent + memory_trend * time_factor * 12.0).min(100.0),
                ),
                risk_level: Self::risk_level(memory_trend, latest.memory_percent),
            },
            TrendForecast {
                resource_type: ResourceType::Requests,
                current_load: latest.request_rate,
                predicted_load: latest.request_rate + request_trend * time_factor * 20.0,
                confidence_interval: (
                    (latest.request_rate + request_trend * time_factor * 10.0).max(0.0),
                    latest.request_rate + request_trend * time_factor * 30.0,
                ),
                risk_level: Self::risk_level(request_trend, latest.request_rate / 100.0),
            },
        ];

        let avg_cpu = Self::mean(recent.iter().map(|s| s.cpu_percent));
        let avg_memory = Self::mean(recent.iter().map(|s| s.memory_percent));
        let avg_error_rate = Self::mean(recent.iter().map(|s| s.error_rate));

        let recommendations =
            Self::metric_recommendations(&forecasts, avg_cpu, avg_memory, avg_error_rate);
        let overall_risk = Self::overall_risk(&forecasts, &recommendations);

        info!(
            "Generated prediction {} with {} recommendation(s), overall risk {:?}",
            prediction_id,
            recommendations.len(),
            overall_risk
        );

        Prediction {
            prediction_id,
            timestamp: now,
            time_horizon_hours,
            forecasts,
            recommendations,
            overall_risk,
        }
    }

    /// Least-squares slope over equally spaced values
    fn linear_trend(values: impl Iterator<Item = f64>) -> f64 {
        let data: Vec<f64> = values.collect();
        let n = data.len();
        if n < 2 {
            return 0.0;
        }

        let n_f = n as f64;
        let sum_x = n_f * (n_f - 1.0) / 2.0;
        let sum_x2 = n_f * (n_f - 1.0) * (2.0 * n_f - 1.0) / 6.0;
        let sum_y: f64 = data.iter().sum();
        let sum_xy: f64 = data
            .iter()
            .enumerate()
            .map(|(i, value)| value * i as f64)
            .sum();

        (n_f * sum_xy - sum_x * sum_y) / (n_f * sum_x2 - sum_x * sum_x)
    }

    fn mean(values: impl Iterator<Item = f64>) -> f64 {
        let data: Vec<f64> = values.collect();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().sum::<f64>() / data.len() as f64
    }

    fn risk_level(trend: f64, current: f64) -> RiskLevel {
        if current > 90.0 {
            RiskLevel::High
        } else if current > 75.0 {
            RiskLevel::Medium
        } else if trend > 10.0 {
            RiskLevel::High
        } else if trend > 5.0 && current > 60.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    fn metric_recommendations(
        forecasts: &[TrendForecast],
        avg_cpu: f64,
        avg_memory: f64,
        avg_error_rate: f64,
    ) -> Vec<ScalingRecommendation> {
        let mut recommendations = Vec::new();
        let now = Utc::now().timestamp_millis();

        if let Some(cpu) = forecasts
            .iter()
            .find(|f| f.resource_type == ResourceType::Compute)
        {
            if cpu.predicted_load > 80.0 {
                let severe = cpu.predicted_load > 90.0;
                recommendations.push(ScalingRecommendation {
                    id: format!("cpu-{}", now),
                    resource_type: ResourceType::Compute,
                    action: if severe {
                        ScalingAction::ScaleUp
                    } else {
                        ScalingAction::Optimize
                    },
                    confidence: 0.85,
                    estimated_impact: 25.0,
                    urgency: if severe { Urgency::High } else { Urgency::Medium },
                    reason: format!(
                        "CPU usage predicted to reach {:.1}%",
                        cpu.predicted_load
                    ),
                    current_value: cpu.current_load,
                    target_value: (cpu.predicted_load - 20.0).max(60.0),
                    unit: "CPU percentage".to_string(),
                    source: RecommendationSource::Metrics,
                });
            }
        }

        if let Some(memory) = forecasts
            .iter()
            .find(|f| f.resource_type == ResourceType::Memory)
        {
            if memory.predicted_load > 85.0 {
                recommendations.push(ScalingRecommendation {
                    id: format!("memory-{}", now),
                    resource_type: ResourceType::Memory,
                    action: ScalingAction::ScaleUp,
                    confidence: 0.9,
                    estimated_impact: 30.0,
                    urgency: if memory.predicted_load > 90.0 {
                        Urgency::Critical
                    } else {
                        Urgency::High
                    },
                    reason: format!(
                        "Memory usage predicted to reach {:.1}%",
                        memory.predicted_load
                    ),
                    current_value: memory.current_load,
                    target_value: (memory.predicted_load - 15.0).max(70.0),
                    unit: "Memory percentage".to_string(),
                    source: RecommendationSource::Metrics,
                });
            }
        }

        if avg_error_rate > 3.0 {
            recommendations.push(ScalingRecommendation {
                id: format!("error-optimization-{}", now),
                resource_type: ResourceType::Compute,
                action: ScalingAction::Optimize,
                confidence: 0.75,
                estimated_impact: 15.0,
                urgency: if avg_error_rate > 5.0 {
                    Urgency::High
                } else {
                    Urgency::Medium
                },
                reason: format!("High error rate detected ({:.2}%)", avg_error_rate),
                current_value: avg_error_rate,
                target_value: (avg_error_rate / 2.0).max(1.0),
                unit: "Error percentage".to_string(),
                source: RecommendationSource::Metrics,
            });
        }

        if avg_cpu < 30.0 && avg_memory < 40.0 {
            recommendations.push(ScalingRecommendation {
                id: format!("cost-optimization-{}", now),
                resource_type: ResourceType::Compute,
                action: ScalingAction::ScaleDown,
                confidence: 0.7,
                estimated_impact: -20.0,
                urgency: Urgency::Low,
                reason: format!(
                    "Resources underutilized (CPU: {:.1}%, Memory: {:.1}%)",
                    avg_cpu, avg_memory
                ),
                current_value: avg_cpu,
                target_value: 50.0,
                unit: "CPU percentage".to_string(),
                source: RecommendationSource::Metrics,
            });
        }

        recommendations
    }

    fn overall_risk(
        forecasts: &[TrendForecast],
        recommendations: &[ScalingRecommendation],
    ) -> RiskLevel {
        let forecast_risk = forecasts
            .iter()
            .map(|f| f.risk_level)
            .max()
            .unwrap_or(RiskLevel::Low);
        let urgency_risk = recommendations
            .iter()
            .map(|r| match r.urgency {
                Urgency::Low => RiskLevel::Low,
                Urgency::Medium => RiskLevel::Medium,
                Urgency::High => RiskLevel::High,
                Urgency::Critical => RiskLevel::Critical,
            })
            .max()
            .unwrap_or(RiskLevel::Low);

        forecast_risk.max(urgency_risk)
    }

    fn fallback_prediction(
        prediction_id: String,
        timestamp: Timestamp,
        time_horizon_hours: u32,
    ) -> Prediction {
        Prediction {
            prediction_id,
            timestamp,
            time_horizon_hours,
            forecasts: vec![
                TrendForecast {
                    resource_type: ResourceType::Compute,
                    current_load: 50.0,
                    predicted_load: 55.0,
                    confidence_interval: (45.0, 65.0),
                    risk_level: RiskLevel::Low,
                },
                TrendForecast {
                    resource_type: ResourceType::Memory,
                    current_load: 60.0,
                    predicted_load: 65.0,
                    confidence_interval: (55.0, 75.0),
                    risk_level: RiskLevel::Low,
                },
            ],
            recommendations: vec![ScalingRecommendation {
                id: format!("fallback-{}", Utc::now().timestamp_millis()),
                resource_type: ResourceType::Compute,
                action: ScalingAction::Maintain,
                confidence: 0.5,
                estimated_impact: 0.0,
                urgency: Urgency::Low,
                reason: "Insufficient data for accurate prediction".to_string(),
                current_value: 50.0,
                target_value: 50.0,
                unit: "CPU percentage".to_string(),
                source: RecommendationSource::Metrics,
            }],
            overall_risk: RiskLevel::Low,
        }
    }

    fn urgency_for(severity: ErrorSeverity) -> Urgency {
        match severity {
            ErrorSeverity::Critical => Urgency::Critical,
            ErrorSeverity::High => Urgency::High,
            _ => Urgency::Medium,
        }
    }

    fn rate_suffix(error_rate: f64, endpoint: Option<&str>) -> String {
        match endpoint {
            Some(endpoint) => format!("({:.2}% rate on {})", error_rate, endpoint),
            None => format!("({:.2}% rate)", error_rate),
        }
    }
}

impl ScalingAdvisor for ScalingPredictor {
    fn analyze_and_predict(
        &self,
        samples: &[ResourceSample],
        time_horizon_hours: u32,
    ) -> Prediction {
        ScalingPredictor::analyze_and_predict(self, samples, time_horizon_hours)
    }

    fn scaling_for_error_pattern(
        &self,
        category: ErrorCategory,
        severity: ErrorSeverity,
        observed_error_rate: f64,
        endpoint: Option<&str>,
    ) -> Vec<ScalingRecommendation> {
        let now = Utc::now().timestamp_millis();
        let urgency = Self::urgency_for(severity);
        let suffix = Self::rate_suffix(observed_error_rate, endpoint);
        let mut recommendations = Vec::new();

        match category {
            ErrorCategory::Network => recommendations.push(ScalingRecommendation {
                id: format!("network-{}", now),
                resource_type: ResourceType::Network,
                action: ScalingAction::ScaleUp,
                confidence: 0.8,
                estimated_impact: 25.0,
                urgency,
                reason: format!("Network errors detected {}", suffix),
                current_value: observed_error_rate,
                target_value: (observed_error_rate / 3.0).max(1.0),
                unit: "Error percentage".to_string(),
                source: RecommendationSource::ErrorPattern,
            }),
            ErrorCategory::Database => recommendations.push(ScalingRecommendation {
                id: format!("database-{}", now),
                resource_type: ResourceType::Database,
                action: ScalingAction::ScaleUp,
                confidence: 0.85,
                estimated_impact: 30.0,
                urgency,
                reason: format!("Database errors detected {}", suffix),
                current_value: observed_error_rate,
                target_value: (observed_error_rate / 4.0).max(0.5),
                unit: "Error percentage".to_string(),
                source: RecommendationSource::ErrorPattern,
            }),
            ErrorCategory::ExternalApi => recommendations.push(ScalingRecommendation {
                id: format!("api-{}", now),
                resource_type: ResourceType::Compute,
                action: ScalingAction::Optimize,
                confidence: 0.7,
                estimated_impact: 20.0,
                urgency,
                reason: format!("External API errors detected {}", suffix),
                current_value: observed_error_rate,
                target_value: (observed_error_rate / 2.0).max(1.0),
                unit: "Error percentage".to_string(),
                source: RecommendationSource::ErrorPattern,
            }),
            ErrorCategory::Configuration => recommendations.push(ScalingRecommendation {
                id: format!("config-{}", now),
                resource_type: ResourceType::Compute,
                action: ScalingAction::Optimize,
                confidence: 0.9,
                estimated_impact: 40.0,
                urgency,
                reason: format!("Configuration errors detected {}", suffix),
                current_value: observed_error_rate,
                target_value: (observed_error_rate / 10.0).max(0.1),
                unit: "Error percentage".to_string(),
                source: RecommendationSource::ErrorPattern,
            }),
            _ => {
                if severity >= ErrorSeverity::High {
                    recommendations.push(ScalingRecommendation {
                        id: format!("generic-{}", now),
                        resource_type: ResourceType::Compute,
                        action: ScalingAction::ScaleUp,
                        confidence: 0.6,
                        estimated_impact: 15.0,
                        urgency,
                        reason: format!("High severity errors detected {}", suffix),
                        current_value: observed_error_rate,
                        target_value: (observed_error_rate / 2.0).max(1.0),
                        unit: "Error percentage".to_string(),
                        source: RecommendationSource::ErrorPattern,
                    });
                }
            }
        }

        if severity == ErrorSeverity::Critical {
            recommendations.push(ScalingRecommendation {
                id: format!("monitoring-{}", now),
                resource_type: ResourceType::Compute,
                action: ScalingAction::ScaleUp,
                confidence: 0.8,
                estimated_impact: 30.0,
                urgency: Urgency::High,
                reason: format!(
                    "Critical {:?} errors detected, increase monitoring capacity",
                    category
                ),
                current_value: 1.0,
                target_value: 2.0,
                unit: "monitoring instances".to_string(),
                source: RecommendationSource::ErrorPattern,
            });
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(minutes_ago: i64, cpu: f64, memory: f64, error_rate: f64) -> ResourceSample {
        ResourceSample {
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            cpu_percent: cpu,
            memory_percent: memory,
            request_rate: 100.0,
            error_rate,
            response_time_ms: 200.0,
            active_connections: 50,
        }
    }

    #[test]
    fn test_fallback_prediction_on_insufficient_samples() {
        let predictor = ScalingPredictor::new();

        let prediction = predictor.analyze_and_predict(&[], 24);
        assert_eq!(prediction.overall_risk, RiskLevel::Low);
        assert_eq!(prediction.recommendations.len(), 1);
        assert_eq!(prediction.recommendations[0].action, ScalingAction::Maintain);

        let one = [sample(0, 50.0, 60.0, 0.5)];
        let prediction = predictor.analyze_and_predict(&one, 24);
        assert_eq!(prediction.recommendations[0].action, ScalingAction::Maintain);
    }

    #[test]
    fn test_rising_cpu_produces_scale_up_recommendation() {
        let predictor = ScalingPredictor::new();
        let samples: Vec<ResourceSample> = (0..10)
            .map(|i| sample(10 - i, 60.0 + (i as f64) * 4.0, 50.0, 0.5))
            .collect();

        let prediction = predictor.analyze_and_predict(&samples, 24);
        let cpu_rec = prediction
            .recommendations
            .iter()
            .find(|r| r.resource_type == ResourceType::Compute)
            .expect("expected a compute recommendation");
        assert_eq!(cpu_rec.action, ScalingAction::ScaleUp);
        assert!(prediction.overall_risk >= RiskLevel::Medium);
    }

    #[test]
    fn test_underutilized_resources_produce_scale_down() {
        let predictor = ScalingPredictor::new();
        let samples: Vec<ResourceSample> =
            (0..10).map(|i| sample(10 - i, 20.0, 30.0, 0.1)).collect();

        let prediction = predictor.analyze_and_predict(&samples, 24);
        assert!(prediction
            .recommendations
            .iter()
            .any(|r| r.action == ScalingAction::ScaleDown));
    }

    #[test]
    fn test_high_error_rate_produces_optimize_recommendation() {
        let predictor = ScalingPredictor::new();
        let samples: Vec<ResourceSample> =
            (0..10).map(|i| sample(10 - i, 50.0, 50.0, 6.0)).collect();

        let prediction = predictor.analyze_and_predict(&samples, 24);
        let error_rec = prediction
            .recommendations
            .iter()
            .find(|r| r.action == ScalingAction::Optimize)
            .expect("expected an optimize recommendation");
        assert_eq!(error_rec.urgency, Urgency::High);
    }

    #[test]
    fn test_linear_trend_detects_slope() {
        let rising = ScalingPredictor::linear_trend([1.0, 2.0, 3.0, 4.0].into_iter());
        assert!((rising - 1.0).abs() < 1e-9);

        let flat = ScalingPredictor::linear_trend([5.0, 5.0, 5.0].into_iter());
        assert!(flat.abs() < 1e-9);

        let falling = ScalingPredictor::linear_trend([4.0, 3.0, 2.0].into_iter());
        assert!(falling < 0.0);

        let steep = ScalingPredictor::linear_trend((0..10).map(|i| 60.0 + f64::from(i) * 4.0));
        assert!((steep - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_pattern_category_resource_types() {
        let predictor = ScalingPredictor::new();

        let network = predictor.scaling_for_error_pattern(
            ErrorCategory::Network,
            ErrorSeverity::High,
            2.0,
            None,
        );
        assert_eq!(network[0].resource_type, ResourceType::Network);
        assert_eq!(network[0].action, ScalingAction::ScaleUp);

        let database = predictor.scaling_for_error_pattern(
            ErrorCategory::Database,
            ErrorSeverity::High,
            2.0,
            Some("/api/bookings"),
        );
        assert_eq!(database[0].resource_type, ResourceType::Database);
        assert!(database[0].reason.contains("/api/bookings"));

        let api = predictor.scaling_for_error_pattern(
            ErrorCategory::ExternalApi,
            ErrorSeverity::High,
            2.0,
            None,
        );
        assert_eq!(api[0].action, ScalingAction::Optimize);
    }

    #[test]
    fn test_critical_errors_add_monitoring_recommendation() {
        let predictor = ScalingPredictor::new();

        let recs = predictor.scaling_for_error_pattern(
            ErrorCategory::Database,
            ErrorSeverity::Critical,
            5.0,
            None,
        );
        assert_eq!(recs.len(), 2);
        assert!(recs[1].reason.contains("monitoring"));
        assert_eq!(recs[1].source, RecommendationSource::ErrorPattern);
    }

    #[test]
    fn test_low_severity_unknown_category_yields_no_recommendations() {
        let predictor = ScalingPredictor::new();

        let recs = predictor.scaling_for_error_pattern(
            ErrorCategory::Validation,
            ErrorSeverity::Medium,
            1.0,
            None,
        );
        assert!(recs.is_empty());
    }

    #[test]
    fn test_error_pattern_confidence_in_unit_range() {
        let predictor = ScalingPredictor::new();
        for category in ErrorCategory::ALL {
            for severity in [
                ErrorSeverity::Low,
                ErrorSeverity::Medium,
                ErrorSeverity::High,
                ErrorSeverity::Critical,
            ] {
                for rec in
                    predictor.scaling_for_error_pattern(category, severity, 4.2, Some("/api"))
                {
                    assert!((0.0..=1.0).contains(&rec.confidence));
                }
            }
        }
    }
}
