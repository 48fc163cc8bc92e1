use crate::events::{ErrorCategory, ErrorEvent, ErrorSeverity, Timestamp};
use crate::routing::teams::{PerformanceScoring, ScoringStrategy, TeamRegistry};
use chrono::{Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Alert-relevant view of an error event plus a generated alert id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertContext {
    /// Unique per invocation, composed from the error id and timestamp so
    /// that duplicate error ids still yield distinct alerts
    pub alert_id: String,
    pub error_id: String,
    pub timestamp: Timestamp,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

impl AlertContext {
    /// Derive an alert context from an error event
    pub fn from_event(event: &ErrorEvent) -> Self {
        Self {
            alert_id: format!("{}-{}", event.error_id, event.timestamp.timestamp_millis()),
            error_id: event.error_id.clone(),
            timestamp: event.timestamp,
            category: event.category,
            severity: event.severity,
            message: event.message.clone(),
            endpoint: event.endpoint.clone(),
            component: event.component.clone(),
        }
    }
}

/// The routing decision for one alert
///
/// Always deliverable: confidence is informational and never suppresses the
/// alert. Whether to alert at all is the orchestrator's decision, not the
/// router's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertDecision {
    pub alert_id: String,
    pub primary_team: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_team: Option<String>,
    /// Confidence in the team selection, in [0, 1]
    pub confidence: f64,
    /// Ordinal urgency: higher means further up the escalation chain
    pub escalation_level: u8,
    pub estimated_response_minutes: u32,
    pub notification_channels: Vec<String>,
}

/// Trait for the alert-routing stage of the processing pipeline
pub trait AlertRouting: Send + Sync {
    fn route_alert(&self, context: &AlertContext) -> AlertDecision;
}

const HISTORY_WINDOW_MINUTES: i64 = 15;
const HISTORY_CAPACITY: usize = 256;

/// Routes alerts to responding teams based on category, severity, and
/// recent alert history
///
/// The team registry is read-mostly configuration. The only mutable state is
/// the recent-category history used for escalation bumps, kept behind a
/// mutex so the router can be shared across concurrent calls.
pub struct AlertRouter {
    registry: TeamRegistry,
    scoring: Box<dyn ScoringStrategy>,
    recent: Mutex<VecDeque<(Timestamp, ErrorCategory)>>,
}

impl AlertRouter {
    /// Create a router over a registry with the default scoring strategy
    pub fn new(registry: TeamRegistry) -> Self {
        Self::with_scoring(registry, Box::new(PerformanceScoring))
    }

    /// Create a router with a custom scoring strategy
    pub fn with_scoring(registry: TeamRegistry, scoring: Box<dyn ScoringStrategy>) -> Self {
        Self {
            registry,
            scoring,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Forget the recent-alert history used for escalation bumps
    pub fn clear_history(&self) {
        self.recent.lock().unwrap().clear();
    }

    /// Base escalation level for a severity
    fn base_escalation(severity: ErrorSeverity) -> u8 {
        match severity {
            ErrorSeverity::Low | ErrorSeverity::Medium => 1,
            ErrorSeverity::High => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    /// Notification channels for a severity
    fn channels_for(severity: ErrorSeverity) -> Vec<String> {
        match severity {
            ErrorSeverity::Low | ErrorSeverity::Medium => vec!["slack".to_string()],
            ErrorSeverity::High => vec!["slack".to_string(), "email".to_string()],
            ErrorSeverity::Critical => vec![
                "slack".to_string(),
                "email".to_string(),
                "pagerduty".to_string(),
            ],
        }
    }

    /// Check whether the category repeated within the history window, then
    /// record this alert into the history
    fn category_repeated(&self, category: ErrorCategory, timestamp: Timestamp) -> bool {
        let cutoff = Utc::now() - Duration::minutes(HISTORY_WINDOW_MINUTES);
        let mut recent = self.recent.lock().unwrap();

        recent.retain(|(time, _)| *time > cutoff);
        let repeated = recent.iter().any(|(_, c)| *c == category);

        recent.push_back((timestamp, category));
        if recent.len() > HISTORY_CAPACITY {
            recent.pop_front();
        }

        repeated
    }
}

impl crate::orchestrator::SystemReset for AlertRouter {
    fn reset(&self) {
        self.clear_history();
    }
}

impl AlertRouting for AlertRouter {
    /// Select the responding team(s) for an alert
    ///
    /// Infallible: an unrecognized category falls back to the catch-all team
    /// rather than failing, since an unroutable alert is strictly worse than
    /// a best-guess one.
    fn route_alert(&self, context: &AlertContext) -> AlertDecision {
        let (primary, mapped) = match self.registry.primary_for(context.category) {
            Some(team) => (team, true),
            None => (self.registry.fallback(), false),
        };
        let secondary = self
            .registry
            .secondary_for(context.category)
            .map(|team| team.id.clone());

        let performance = self.registry.performance_for(&primary.id).copied();
        let confidence = self
            .scoring
            .confidence(context.category, context.severity, performance)
            .clamp(0.0, 1.0);

        let mut escalation_level = Self::base_escalation(context.severity);
        if self.category_repeated(context.category, context.timestamp) {
            escalation_level = escalation_level.saturating_add(1);
        }

        let base_response = performance.map(|p| p.avg_response_minutes).unwrap_or(30);
        let estimated_response_minutes = if context.severity == ErrorSeverity::Critical {
            (base_response / 2).max(5)
        } else {
            base_response
        };

        debug!(
            "Routing alert {} ({:?}/{:?}) to {} (mapped: {}, confidence: {:.2}, escalation: {})",
            context.alert_id, context.category, context.severity, primary.id, mapped, confidence,
            escalation_level
        );

        AlertDecision {
            alert_id: context.alert_id.clone(),
            primary_team: primary.id.clone(),
            secondary_team: secondary,
            confidence,
            escalation_level,
            estimated_response_minutes,
            notification_channels: Self::channels_for(context.severity),
        }
    }
}
