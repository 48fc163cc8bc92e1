//! Remediation rule model
//!
//! Rules pair a set of conditions over error-event fields with one or more
//! corrective actions. Conditions are data-driven so that rule sets can be
//! loaded from external configuration rather than hard-coded.

use crate::events::{ErrorCategory, ErrorSeverity};
use crate::remediation::engine::RemediationContext;
use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Field of a remediation context that a condition inspects
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionField {
    Category,
    Severity,
    Endpoint,
    Message,
    StatusCode,
    UserAgent,
}

/// Comparison operator applied between a context field and a condition value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Matches,
    In,
}

/// One predicate over a remediation context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub field: ConditionField,
    pub operator: ConditionOperator,
    pub value: Value,
}

/// Kind of corrective action a rule can execute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    /// Re-attempt the failed operation
    Retry,
    /// Track failures and open a circuit breaker for the endpoint
    CircuitBreaker,
    /// Invalidate caches related to the failed request
    CacheBust,
    /// Restart the affected resource
    ResourceRestart,
    /// Request additional capacity
    ScaleUp,
    /// Notify an operations channel
    Notify,
    /// Redirect traffic away from the failing endpoint
    Redirect,
    /// Serve a fallback response
    Fallback,
    /// Delegate to a registered custom handler
    Custom,
}

impl ActionKind {
    /// Stable name used in execution results and handler registration
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Retry => "retry",
            ActionKind::CircuitBreaker => "circuitBreaker",
            ActionKind::CacheBust => "cacheBust",
            ActionKind::ResourceRestart => "resourceRestart",
            ActionKind::ScaleUp => "scaleUp",
            ActionKind::Notify => "notify",
            ActionKind::Redirect => "redirect",
            ActionKind::Fallback => "fallback",
            ActionKind::Custom => "custom",
        }
    }
}

/// One corrective action with its configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    /// Action-specific settings (retry counts, channels, thresholds, ...)
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Milliseconds to wait before executing the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl Action {
    /// Create an action of the given kind with empty configuration
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            config: HashMap::new(),
            delay_ms: None,
        }
    }

    /// Add a configuration entry
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Delay execution by the given number of milliseconds
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// A remediation rule: conditions plus ordered actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationRule {
    /// Stable identifier used in execution results and statistics
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// What the rule is for
    pub description: String,
    /// All conditions must hold for the rule to match
    pub conditions: Vec<Condition>,
    /// Actions executed in order on a match
    pub actions: Vec<Action>,
    /// 1-100, higher runs first
    pub priority: u8,
    /// Disabled rules are never executed
    pub enabled: bool,
}

impl RemediationRule {
    /// Check whether every condition of this rule holds for the context
    pub fn matches(&self, context: &RemediationContext) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.evaluate(context))
    }
}

impl Condition {
    /// Evaluate this condition against a remediation context
    ///
    /// Missing optional fields never match. An invalid regex in a `Matches`
    /// condition evaluates to false rather than failing the rule set.
    pub fn evaluate(&self, context: &RemediationContext) -> bool {
        let field_value = match self.field_value(context) {
            Some(value) => value,
            None => return false,
        };

        match self.operator {
            ConditionOperator::Equals => field_value == self.value,
            ConditionOperator::Contains => {
                Self::as_text(&field_value).contains(&Self::as_text(&self.value))
            }
            ConditionOperator::StartsWith => {
                Self::as_text(&field_value).starts_with(&Self::as_text(&self.value))
            }
            ConditionOperator::EndsWith => {
                Self::as_text(&field_value).ends_with(&Self::as_text(&self.value))
            }
            ConditionOperator::GreaterThan => match (field_value.as_f64(), self.value.as_f64()) {
                (Some(field), Some(value)) => field > value,
                _ => false,
            },
            ConditionOperator::LessThan => match (field_value.as_f64(), self.value.as_f64()) {
                (Some(field), Some(value)) => field < value,
                _ => false,
            },
            ConditionOperator::Matches => {
                let pattern = Self::as_text(&self.value);
                match Regex::new(&pattern) {
                    Ok(regex) => regex.is_match(&Self::as_text(&field_value)),
                    Err(e) => {
                        warn!("Invalid regex in rule condition '{}': {}", pattern, e);
                        false
                    }
                }
            }
            ConditionOperator::In => match &self.value {
                Value::Array(values) => values.contains(&field_value),
                _ => false,
            },
        }
    }

    /// Extract the inspected field as a JSON value for uniform comparison
    fn field_value(&self, context: &RemediationContext) -> Option<Value> {
        match self.field {
            ConditionField::Category => serde_json::to_value(context.category).ok(),
            ConditionField::Severity => serde_json::to_value(context.severity).ok(),
            ConditionField::Endpoint => context.endpoint.clone().map(Value::String),
            ConditionField::Message => Some(Value::String(context.message.clone())),
            ConditionField::StatusCode => context.status_code.map(Value::from),
            ConditionField::UserAgent => context.user_agent.clone().map(Value::String),
        }
    }

    /// Render a JSON value as text for substring and pattern operators
    fn as_text(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Convenience constructors for the condition model
impl Condition {
    pub fn category_equals(category: ErrorCategory) -> Self {
        Self {
            field: ConditionField::Category,
            operator: ConditionOperator::Equals,
            value: serde_json::to_value(category).unwrap_or(Value::Null),
        }
    }

    pub fn severity_equals(severity: ErrorSeverity) -> Self {
        Self {
            field: ConditionField::Severity,
            operator: ConditionOperator::Equals,
            value: serde_json::to_value(severity).unwrap_or(Value::Null),
        }
    }

    pub fn category_in(categories: &[ErrorCategory]) -> Self {
        Self {
            field: ConditionField::Category,
            operator: ConditionOperator::In,
            value: Value::Array(
                categories
                    .iter()
                    .filter_map(|c| serde_json::to_value(c).ok())
                    .collect(),
            ),
        }
    }

    pub fn severity_in(severities: &[ErrorSeverity]) -> Self {
        Self {
            field: ConditionField::Severity,
            operator: ConditionOperator::In,
            value: Value::Array(
                severities
                    .iter()
                    .filter_map(|s| serde_json::to_value(s).ok())
                    .collect(),
            ),
        }
    }

    pub fn message_contains(fragment: &str) -> Self {
        Self {
            field: ConditionField::Message,
            operator: ConditionOperator::Contains,
            value: Value::String(fragment.to_string()),
        }
    }
}

/// Default rule set covering the common transient-failure patterns
///
/// Installed by `RemediationEngine::with_default_rules`; production
/// deployments typically replace or extend these from configuration.
pub fn default_rules() -> Vec<RemediationRule> {
    vec![
        RemediationRule {
            id: "retry-network-errors".to_string(),
            name: "Retry Network Errors".to_string(),
            description: "Automatically retry failed requests due to network issues".to_string(),
            conditions: vec![
                Condition::category_equals(ErrorCategory::Network),
                Condition::severity_in(&[ErrorSeverity::Low, ErrorSeverity::Medium]),
            ],
            actions: vec![Action::new(ActionKind::Retry)
                .with_config("max_retries", Value::from(3))
                .with_config("retry_delay_ms", Value::from(1000))
                .with_delay_ms(100)],
            priority: 50,
            enabled: true,
        },
        RemediationRule {
            id: "circuit-breaker-api".to_string(),
            name: "API Circuit Breaker".to_string(),
            description: "Open circuit breaker for endpoints with repeated failures".to_string(),
            conditions: vec![
                Condition::category_in(&[ErrorCategory::ExternalApi, ErrorCategory::Network]),
                Condition::severity_in(&[ErrorSeverity::High, ErrorSeverity::Critical]),
            ],
            actions: vec![
                Action::new(ActionKind::CircuitBreaker)
                    .with_config("failure_threshold", Value::from(5))
                    .with_config("success_threshold", Value::from(3))
                    .with_config("timeout_ms", Value::from(60_000)),
                Action::new(ActionKind::Notify)
                    .with_config("channels", serde_json::json!(["slack"]))
                    .with_config(
                        "message",
                        Value::String("Circuit breaker triggered".to_string()),
                    ),
            ],
            priority: 80,
            enabled: true,
        },
        RemediationRule {
            id: "cache-bust-stale".to_string(),
            name: "Bust Stale Cache".to_string(),
            description: "Clear cache when stale data errors occur".to_string(),
            conditions: vec![
                Condition::category_equals(ErrorCategory::Database),
                Condition::message_contains("stale"),
            ],
            actions: vec![Action::new(ActionKind::CacheBust)],
            priority: 60,
            enabled: true,
        },
        RemediationRule {
            id: "notify-critical".to_string(),
            name: "Critical Error Notification".to_string(),
            description: "Send immediate notifications for critical errors".to_string(),
            conditions: vec![Condition::severity_equals(ErrorSeverity::Critical)],
            actions: vec![Action::new(ActionKind::Notify)
                .with_config("channels", serde_json::json!(["slack", "email", "pagerduty"]))],
            priority: 100,
            enabled: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorEvent;

    fn test_context(
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: &str,
    ) -> RemediationContext {
        RemediationContext::from_event(
            &ErrorEvent::new("e-test", category, severity, message)
                .with_endpoint("/api/bookings")
                .with_status_code(503),
        )
    }

    #[test]
    fn test_category_equals_condition() {
        let context = test_context(ErrorCategory::Network, ErrorSeverity::Low, "timeout");

        assert!(Condition::category_equals(ErrorCategory::Network).evaluate(&context));
        assert!(!Condition::category_equals(ErrorCategory::Database).evaluate(&context));
    }

    #[test]
    fn test_severity_in_condition() {
        let context = test_context(ErrorCategory::Network, ErrorSeverity::Medium, "timeout");

        let condition = Condition::severity_in(&[ErrorSeverity::Low, ErrorSeverity::Medium]);
        assert!(condition.evaluate(&context));

        let condition = Condition::severity_in(&[ErrorSeverity::High, ErrorSeverity::Critical]);
        assert!(!condition.evaluate(&context));
    }

    #[test]
    fn test_message_string_operators() {
        let context = test_context(
            ErrorCategory::Database,
            ErrorSeverity::High,
            "stale data returned from cache",
        );

        assert!(Condition::message_contains("stale").evaluate(&context));
        assert!(!Condition::message_contains("fresh").evaluate(&context));

        let starts = Condition {
            field: ConditionField::Message,
            operator: ConditionOperator::StartsWith,
            value: Value::String("stale data".to_string()),
        };
        assert!(starts.evaluate(&context));

        let ends = Condition {
            field: ConditionField::Message,
            operator: ConditionOperator::EndsWith,
            value: Value::String("from cache".to_string()),
        };
        assert!(ends.evaluate(&context));
    }

    #[test]
    fn test_status_code_numeric_comparison() {
        let context = test_context(ErrorCategory::ExternalApi, ErrorSeverity::High, "bad gateway");

        let greater = Condition {
            field: ConditionField::StatusCode,
            operator: ConditionOperator::GreaterThan,
            value: Value::from(499),
        };
        assert!(greater.evaluate(&context));

        let less = Condition {
            field: ConditionField::StatusCode,
            operator: ConditionOperator::LessThan,
            value: Value::from(500),
        };
        assert!(!less.evaluate(&context));
    }

    #[test]
    fn test_regex_matches_condition() {
        let context = test_context(
            ErrorCategory::Database,
            ErrorSeverity::High,
            "connection pool exhausted after 30s",
        );

        let matches = Condition {
            field: ConditionField::Message,
            operator: ConditionOperator::Matches,
            value: Value::String(r"pool exhausted after \d+s".to_string()),
        };
        assert!(matches.evaluate(&context));

        // Invalid regex evaluates to false instead of failing the rule set
        let invalid = Condition {
            field: ConditionField::Message,
            operator: ConditionOperator::Matches,
            value: Value::String("(unclosed".to_string()),
        };
        assert!(!invalid.evaluate(&context));
    }

    #[test]
    fn test_missing_optional_field_never_matches() {
        let context = RemediationContext::from_event(&ErrorEvent::new(
            "e-no-endpoint",
            ErrorCategory::Network,
            ErrorSeverity::Low,
            "timeout",
        ));

        let condition = Condition {
            field: ConditionField::Endpoint,
            operator: ConditionOperator::Contains,
            value: Value::String("/api".to_string()),
        };
        assert!(!condition.evaluate(&context));
    }

    #[test]
    fn test_rule_matches_requires_all_conditions() {
        let rule = RemediationRule {
            id: "test".to_string(),
            name: "Test".to_string(),
            description: String::new(),
            conditions: vec![
                Condition::category_equals(ErrorCategory::Network),
                Condition::severity_equals(ErrorSeverity::Low),
            ],
            actions: vec![],
            priority: 10,
            enabled: true,
        };

        let matching = test_context(ErrorCategory::Network, ErrorSeverity::Low, "timeout");
        assert!(rule.matches(&matching));

        let wrong_severity = test_context(ErrorCategory::Network, ErrorSeverity::High, "timeout");
        assert!(!rule.matches(&wrong_severity));
    }

    #[test]
    fn test_default_rules_cover_expected_patterns() {
        let rules = default_rules();
        assert_eq!(rules.len(), 4);

        let critical = test_context(
            ErrorCategory::Database,
            ErrorSeverity::Critical,
            "connection pool exhausted",
        );
        let matched: Vec<&str> = rules
            .iter()
            .filter(|rule| rule.matches(&critical))
            .map(|rule| rule.id.as_str())
            .collect();
        assert_eq!(matched, vec!["notify-critical"]);

        let transient = test_context(ErrorCategory::Network, ErrorSeverity::Low, "reset");
        let matched: Vec<&str> = rules
            .iter()
            .filter(|rule| rule.matches(&transient))
            .map(|rule| rule.id.as_str())
            .collect();
        assert_eq!(matched, vec!["retry-network-errors"]);
    }

    #[test]
    fn test_rule_serialization_round_trip() {
        let rules = default_rules();
        let json = serde_json::to_string(&rules).unwrap();
        let deserialized: Vec<RemediationRule> = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.len(), rules.len());
        assert_eq!(deserialized[0].id, rules[0].id);
        assert_eq!(deserialized[0].conditions, rules[0].conditions);
    }
}
