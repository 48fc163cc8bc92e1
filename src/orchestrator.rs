//! Coordination root for error triage
//!
//! The orchestrator ingests one error event at a time, invokes remediation,
//! alert routing, and scaling prediction under their trigger policies, and
//! aggregates a single result. It never fails: every stage error is absorbed,
//! logged locally, and recorded as an untriggered stage, because a component
//! that exists to handle errors must be strictly more fault tolerant than the
//! systems it watches.

use crate::events::{ErrorCategory, ErrorEvent, ErrorSeverity};
use crate::rates::RateTracker;
use crate::remediation::{RemediationContext, Remediator, RuleExecutionResult};
use crate::routing::{AlertContext, AlertDecision, AlertRouting};
use crate::scaling::{
    MetricsSource, Prediction, ScalingAdvisor, ScalingRecommendation, Urgency,
};
use crate::sink::ErrorLogSink;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of the remediation stage for one event
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemediationSummary {
    pub triggered: bool,
    /// True when at least one executed rule succeeded
    pub success: bool,
    pub rules_executed: usize,
    pub results: Vec<RuleExecutionResult>,
}

/// Outcome of the alert-routing stage for one event
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertRoutingSummary {
    pub triggered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<AlertDecision>,
}

/// Outcome of the scaling-prediction stage for one event
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScalingSummary {
    pub triggered: bool,
    pub recommendations: Vec<ScalingRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highest_urgency: Option<Urgency>,
}

/// The single aggregate returned for each processed event
///
/// Exactly one of these is produced per call, even when every stage fails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResult {
    pub error_id: String,
    pub remediation: RemediationSummary,
    pub alert_routing: AlertRoutingSummary,
    pub scaling: ScalingSummary,
    pub processing_time_ms: u64,
}

impl IntegrationResult {
    /// Default-initialized result with all stages untriggered
    fn untriggered(error_id: &str) -> Self {
        Self {
            error_id: error_id.to_string(),
            remediation: RemediationSummary::default(),
            alert_routing: AlertRoutingSummary::default(),
            scaling: ScalingSummary::default(),
            processing_time_ms: 0,
        }
    }
}

/// Operator-visible orchestrator state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorStatus {
    pub enabled: bool,
    pub stage_timeout_secs: u64,
    /// Errors currently inside the rate tracker's window
    pub windowed_error_count: usize,
    /// Cumulative remediation stage failures since start
    pub remediation_failures: u64,
    /// Cumulative event-logging failures since start
    pub logging_failures: u64,
}

/// Result of an operator-triggered forecast outside the event path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManualPrediction {
    pub prediction: Prediction,
    pub error_pattern_recommendations: Vec<ScalingRecommendation>,
}

/// Reset hook for stages that hold transient state
///
/// Registered stages are cleared by `reset_systems`; stages without such
/// state simply never register.
pub trait SystemReset: Send + Sync {
    fn reset(&self);
}

const SCALING_CAPACITY_CATEGORIES: [ErrorCategory; 3] = [
    ErrorCategory::Database,
    ErrorCategory::Network,
    ErrorCategory::ExternalApi,
];

/// Coordinates the triage stages for each incoming error event
///
/// All collaborators are injected at construction so tests can substitute
/// doubles per stage. A single instance is shared across concurrent calls;
/// the rate tracker is the only mutable state crossing call boundaries.
pub struct Orchestrator {
    sink: Arc<dyn ErrorLogSink>,
    remediator: Arc<dyn Remediator>,
    router: Arc<dyn AlertRouting>,
    advisor: Arc<dyn ScalingAdvisor>,
    rates: Arc<RateTracker>,
    metrics: Arc<dyn MetricsSource>,
    enabled: AtomicBool,
    stage_timeout: Duration,
    resets: Vec<Arc<dyn SystemReset>>,
    remediation_failures: AtomicU64,
    logging_failures: AtomicU64,
}

impl Orchestrator {
    /// Create an orchestrator over the injected stage implementations
    pub fn new(
        sink: Arc<dyn ErrorLogSink>,
        remediator: Arc<dyn Remediator>,
        router: Arc<dyn AlertRouting>,
        advisor: Arc<dyn ScalingAdvisor>,
        rates: Arc<RateTracker>,
        metrics: Arc<dyn MetricsSource>,
    ) -> Self {
        Self {
            sink,
            remediator,
            router,
            advisor,
            rates,
            metrics,
            enabled: AtomicBool::new(true),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            resets: Vec::new(),
            remediation_failures: AtomicU64::new(0),
            logging_failures: AtomicU64::new(0),
        }
    }

    /// Override the per-stage timeout for I/O-bound stages
    pub fn with_stage_timeout(mut self, stage_timeout: Duration) -> Self {
        self.stage_timeout = stage_timeout;
        self
    }

    /// Register a stage to be cleared by `reset_systems`
    pub fn register_reset(&mut self, reset: Arc<dyn SystemReset>) {
        self.resets.push(reset);
    }

    /// Enable or disable event processing
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(
            "Error triage processing {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Whether event processing is currently enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Operator-visible status snapshot
    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            enabled: self.is_enabled(),
            stage_timeout_secs: self.stage_timeout.as_secs(),
            windowed_error_count: self.rates.total(),
            remediation_failures: self.remediation_failures.load(Ordering::Relaxed),
            logging_failures: self.logging_failures.load(Ordering::Relaxed),
        }
    }

    /// Clear transient state in the rate tracker and all registered stages
    ///
    /// No-op-safe: stages without transient state never registered.
    pub fn reset_systems(&self) {
        self.rates.clear();
        for reset in &self.resets {
            reset.reset();
        }
        info!("Triage subsystem state reset");
    }

    /// Process one error event through the full triage pipeline
    ///
    /// Never fails. Stage failures and timeouts are logged locally and show
    /// up as `triggered: false` for that stage; the other stages still run.
    /// When disabled, returns a default result without invoking any stage.
    pub async fn process_error(&self, event: &ErrorEvent) -> IntegrationResult {
        if !self.is_enabled() {
            debug!(
                "Processing disabled, skipping error {}",
                event.error_id
            );
            return IntegrationResult::untriggered(&event.error_id);
        }

        let start = Instant::now();
        let context = RemediationContext::from_event(event);

        // Event logging and remediation are I/O bound and independent, so
        // they run concurrently, each under the stage timeout. Routing and
        // scaling are cheap in-process computations and run inline after.
        let (log_outcome, remediation_outcome) = tokio::join!(
            timeout(self.stage_timeout, self.sink.log_event(event)),
            timeout(self.stage_timeout, self.remediator.remediate(&context)),
        );

        match log_outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.logging_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Event logging failed for {}: {}", event.error_id, e);
            }
            Err(_) => {
                self.logging_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Event logging timed out for {}", event.error_id);
            }
        }

        let remediation = match remediation_outcome {
            Ok(Ok(results)) => RemediationSummary {
                triggered: !results.is_empty(),
                success: results.iter().any(|r| r.success),
                rules_executed: results.len(),
                results,
            },
            Ok(Err(e)) => {
                self.remediation_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Remediation failed for {}: {}", event.error_id, e);
                RemediationSummary::default()
            }
            Err(_) => {
                self.remediation_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Remediation timed out for {}", event.error_id);
                RemediationSummary::default()
            }
        };

        let alert_routing = if self.should_alert(event.severity) {
            let decision = self.router.route_alert(&AlertContext::from_event(event));
            AlertRoutingSummary {
                triggered: true,
                decision: Some(decision),
            }
        } else {
            AlertRoutingSummary::default()
        };

        let scaling = if self.should_predict_scaling(event.category, event.severity) {
            let observed_rate = self.rates.rate_by_category(event.category);
            let recommendations = self.advisor.scaling_for_error_pattern(
                event.category,
                event.severity,
                observed_rate,
                event.endpoint.as_deref(),
            );
            let highest_urgency = recommendations.iter().map(|r| r.urgency).max();
            ScalingSummary {
                triggered: true,
                recommendations,
                highest_urgency,
            }
        } else {
            ScalingSummary::default()
        };

        self.rates.record(event.category, event.severity);

        let result = IntegrationResult {
            error_id: event.error_id.clone(),
            remediation,
            alert_routing,
            scaling,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Processed error {} in {}ms (remediation: {}, alert: {}, scaling: {})",
            result.error_id,
            result.processing_time_ms,
            result.remediation.triggered,
            result.alert_routing.triggered,
            result.scaling.triggered,
        );

        result
    }

    /// Operator-triggered forecast outside the event path
    ///
    /// Fetches samples from the metrics source and, when requested, derives
    /// error-pattern recommendations from the categories currently observed
    /// in the rate window. A failing metrics source degrades to the
    /// predictor's fallback rather than erroring.
    pub async fn manual_scaling_prediction(
        &self,
        time_horizon_hours: u32,
        include_error_patterns: bool,
    ) -> ManualPrediction {
        let samples = match self.metrics.fetch_recent(time_horizon_hours).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Metrics source failed, falling back to empty samples: {}", e);
                Vec::new()
            }
        };

        let prediction = self.advisor.analyze_and_predict(&samples, time_horizon_hours);

        let mut error_pattern_recommendations = Vec::new();
        if include_error_patterns {
            for observed in self.rates.observed_categories() {
                error_pattern_recommendations.extend(self.advisor.scaling_for_error_pattern(
                    observed.category,
                    observed.dominant_severity,
                    observed.rate_percent,
                    None,
                ));
            }
        }

        ManualPrediction {
            prediction,
            error_pattern_recommendations,
        }
    }

    /// Alert-routing trigger policy: only HIGH and CRITICAL severities alert
    /// a human team
    fn should_alert(&self, severity: ErrorSeverity) -> bool {
        severity >= ErrorSeverity::High
    }

    /// Scaling trigger policy: CRITICAL always forecasts; HIGH forecasts only
    /// for capacity-related categories, which are often leading indicators of
    /// resource exhaustion before utilization metrics reflect it
    fn should_predict_scaling(&self, category: ErrorCategory, severity: ErrorSeverity) -> bool {
        severity == ErrorSeverity::Critical
            || (severity == ErrorSeverity::High && SCALING_CAPACITY_CATEGORIES.contains(&category))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemediationError, SinkError};
    use crate::remediation::RemediationEngine;
    use crate::routing::{AlertRouter, TeamRegistry};
    use crate::scaling::{NullMetricsSource, ScalingAction, ScalingPredictor};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;

    /// Sink that counts deliveries and always succeeds
    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
    }

    impl CountingSink {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ErrorLogSink for CountingSink {
        fn log_event<'a>(
            &'a self,
            _event: &'a ErrorEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    /// Remediator that always fails, for stage-isolation tests
    struct FailingRemediator;

    impl Remediator for FailingRemediator {
        fn remediate<'a>(
            &'a self,
            _context: &'a RemediationContext,
        ) -> Pin<
            Box<dyn Future<Output = Result<Vec<RuleExecutionResult>, RemediationError>> + Send + 'a>,
        > {
            Box::pin(async {
                Err(RemediationError::ActionFailed(
                    "stub".to_string(),
                    "injected stage failure".to_string(),
                ))
            })
        }
    }

    /// Remediator that sleeps past any reasonable stage timeout
    struct SlowRemediator;

    impl Remediator for SlowRemediator {
        fn remediate<'a>(
            &'a self,
            _context: &'a RemediationContext,
        ) -> Pin<
            Box<dyn Future<Output = Result<Vec<RuleExecutionResult>, RemediationError>> + Send + 'a>,
        > {
            Box::pin(async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Vec::new())
            })
        }
    }

    fn build_orchestrator() -> Orchestrator {
        build_with(Arc::new(RemediationEngine::with_default_rules()))
    }

    fn build_with(remediator: Arc<dyn Remediator>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(CountingSink::default()),
            remediator,
            Arc::new(AlertRouter::new(TeamRegistry::with_defaults())),
            Arc::new(ScalingPredictor::new()),
            Arc::new(RateTracker::default()),
            Arc::new(NullMetricsSource),
        )
    }

    fn event(
        error_id: &str,
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: &str,
    ) -> ErrorEvent {
        ErrorEvent::new(error_id, category, severity, message)
    }

    #[derive(Debug, Clone, Copy)]
    struct ArbCategory(ErrorCategory);

    impl Arbitrary for ArbCategory {
        fn arbitrary(g: &mut Gen) -> Self {
            ArbCategory(*g.choose(&ErrorCategory::ALL).unwrap())
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct ArbSeverity(ErrorSeverity);

    impl Arbitrary for ArbSeverity {
        fn arbitrary(g: &mut Gen) -> Self {
            ArbSeverity(
                *g.choose(&[
                    ErrorSeverity::Low,
                    ErrorSeverity::Medium,
                    ErrorSeverity::High,
                    ErrorSeverity::Critical,
                ])
                .unwrap(),
            )
        }
    }

    #[tokio::test]
    async fn test_critical_database_error_triggers_alert_and_scaling() {
        let orchestrator = build_orchestrator();
        let event = event(
            "e1",
            ErrorCategory::Database,
            ErrorSeverity::Critical,
            "connection pool exhausted",
        );

        let result = orchestrator.process_error(&event).await;

        assert_eq!(result.error_id, "e1");
        assert!(result.alert_routing.triggered);
        let decision = result.alert_routing.decision.unwrap();
        assert!(!decision.primary_team.is_empty());
        assert!(result.scaling.triggered);
        assert!(!result.scaling.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_low_validation_error_runs_only_remediation_and_logging() {
        let orchestrator = build_orchestrator();
        let event = event(
            "e2",
            ErrorCategory::Validation,
            ErrorSeverity::Low,
            "invalid email format",
        );

        let result = orchestrator.process_error(&event).await;

        assert!(!result.alert_routing.triggered);
        assert!(result.alert_routing.decision.is_none());
        assert!(!result.scaling.triggered);
        assert!(result.scaling.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_scaling_trigger_is_category_aware_at_high_severity() {
        let orchestrator = build_orchestrator();

        let validation = orchestrator
            .process_error(&event(
                "e3",
                ErrorCategory::Validation,
                ErrorSeverity::High,
                "bad payload",
            ))
            .await;
        assert!(validation.alert_routing.triggered);
        assert!(!validation.scaling.triggered);

        let database = orchestrator
            .process_error(&event(
                "e4",
                ErrorCategory::Database,
                ErrorSeverity::High,
                "slow queries",
            ))
            .await;
        assert!(database.scaling.triggered);

        let critical_validation = orchestrator
            .process_error(&event(
                "e5",
                ErrorCategory::Validation,
                ErrorSeverity::Critical,
                "schema corrupted",
            ))
            .await;
        assert!(critical_validation.scaling.triggered);
    }

    #[tokio::test]
    async fn test_disabled_orchestrator_is_a_safe_noop() {
        let sink = Arc::new(CountingSink::default());
        let rates = Arc::new(RateTracker::default());
        let orchestrator = Orchestrator::new(
            sink.clone(),
            Arc::new(RemediationEngine::with_default_rules()),
            Arc::new(AlertRouter::new(TeamRegistry::with_defaults())),
            Arc::new(ScalingPredictor::new()),
            rates.clone(),
            Arc::new(NullMetricsSource),
        );

        orchestrator.set_enabled(false);
        assert!(!orchestrator.is_enabled());

        let result = orchestrator
            .process_error(&event(
                "e6",
                ErrorCategory::Database,
                ErrorSeverity::Critical,
                "down",
            ))
            .await;

        assert_eq!(result.error_id, "e6");
        assert!(!result.remediation.triggered);
        assert!(!result.alert_routing.triggered);
        assert!(!result.scaling.triggered);
        assert_eq!(sink.calls(), 0);
        assert_eq!(rates.total(), 0);
    }

    #[tokio::test]
    async fn test_remediation_failure_is_isolated_from_other_stages() {
        let orchestrator = build_with(Arc::new(FailingRemediator));
        let event = event(
            "e7",
            ErrorCategory::Database,
            ErrorSeverity::Critical,
            "connection pool exhausted",
        );

        let result = orchestrator.process_error(&event).await;

        assert!(!result.remediation.triggered);
        assert!(result.alert_routing.triggered);
        assert!(result.scaling.triggered);
        assert_eq!(orchestrator.status().remediation_failures, 1);
    }

    #[tokio::test]
    async fn test_slow_remediation_times_out_without_stalling_the_pipeline() {
        let orchestrator =
            build_with(Arc::new(SlowRemediator)).with_stage_timeout(Duration::from_millis(50));
        let event = event(
            "e8",
            ErrorCategory::Network,
            ErrorSeverity::High,
            "connection reset",
        );

        let result = orchestrator.process_error(&event).await;

        assert!(!result.remediation.triggered);
        assert!(result.alert_routing.triggered);
        assert_eq!(orchestrator.status().remediation_failures, 1);
    }

    #[tokio::test]
    async fn test_duplicate_error_ids_produce_independent_results() {
        let orchestrator = build_orchestrator();
        let event = event(
            "dup",
            ErrorCategory::Network,
            ErrorSeverity::Medium,
            "transient glitch",
        );

        let first = orchestrator.process_error(&event).await;
        let second = orchestrator.process_error(&event).await;

        assert_eq!(first.error_id, "dup");
        assert_eq!(second.error_id, "dup");
        assert_eq!(orchestrator.status().windowed_error_count, 2);
    }

    #[tokio::test]
    async fn test_reset_systems_clears_rate_window_and_registered_stages() {
        let engine = Arc::new(RemediationEngine::with_default_rules());
        let router = Arc::new(AlertRouter::new(TeamRegistry::with_defaults()));
        let rates = Arc::new(RateTracker::default());
        let mut orchestrator = Orchestrator::new(
            Arc::new(CountingSink::default()),
            engine.clone(),
            router.clone(),
            Arc::new(ScalingPredictor::new()),
            rates.clone(),
            Arc::new(NullMetricsSource),
        );
        orchestrator.register_reset(engine.clone());
        orchestrator.register_reset(router.clone());

        orchestrator
            .process_error(&event(
                "e9",
                ErrorCategory::Database,
                ErrorSeverity::High,
                "slow queries",
            ))
            .await;
        assert_eq!(rates.total(), 1);

        orchestrator.reset_systems();
        assert_eq!(rates.total(), 0);
        assert_eq!(orchestrator.status().windowed_error_count, 0);
    }

    #[tokio::test]
    async fn test_manual_prediction_falls_back_without_metrics() {
        let orchestrator = build_orchestrator();

        let manual = orchestrator.manual_scaling_prediction(24, false).await;
        assert_eq!(manual.prediction.time_horizon_hours, 24);
        assert_eq!(
            manual.prediction.recommendations[0].action,
            ScalingAction::Maintain
        );
        assert!(manual.error_pattern_recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_manual_prediction_includes_observed_error_patterns() {
        let orchestrator = build_orchestrator();
        orchestrator
            .process_error(&event(
                "e10",
                ErrorCategory::Database,
                ErrorSeverity::Critical,
                "pool exhausted",
            ))
            .await;

        let manual = orchestrator.manual_scaling_prediction(24, true).await;
        assert!(!manual.error_pattern_recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_status_reflects_configuration() {
        let orchestrator = build_orchestrator().with_stage_timeout(Duration::from_secs(3));
        let status = orchestrator.status();
        assert!(status.enabled);
        assert_eq!(status.stage_timeout_secs, 3);
        assert_eq!(status.windowed_error_count, 0);
        assert_eq!(status.remediation_failures, 0);
        assert_eq!(status.logging_failures, 0);
    }

    #[quickcheck]
    fn prop_exactly_one_result_with_matching_error_id(
        category: ArbCategory,
        severity: ArbSeverity,
        suffix: u32,
    ) -> bool {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let orchestrator = build_orchestrator();
        let error_id = format!("e-{}", suffix);
        let event = ErrorEvent::new(error_id.clone(), category.0, severity.0, "fault");

        let result = rt.block_on(orchestrator.process_error(&event));
        result.error_id == error_id
    }

    #[quickcheck]
    fn prop_alerting_is_severity_gated(category: ArbCategory, severity: ArbSeverity) -> bool {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let orchestrator = build_orchestrator();
        let event = ErrorEvent::new("e-gate", category.0, severity.0, "fault");

        let result = rt.block_on(orchestrator.process_error(&event));
        let expected = severity.0 >= ErrorSeverity::High;
        result.alert_routing.triggered == expected
            && result.alert_routing.decision.is_some() == expected
    }
}
