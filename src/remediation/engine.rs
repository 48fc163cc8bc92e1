use crate::error::RemediationError;
use crate::events::{ErrorCategory, ErrorEvent, ErrorSeverity, Timestamp};
use crate::remediation::rules::{Action, ActionKind, RemediationRule};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Trait for the remediation stage of the processing pipeline
///
/// The orchestrator depends on this trait rather than the concrete engine so
/// that tests can substitute fault-injecting doubles.
pub trait Remediator: Send + Sync {
    fn remediate<'a>(
        &'a self,
        context: &'a RemediationContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RuleExecutionResult>, RemediationError>> + Send + 'a>>;
}

/// Trait for custom remediation action implementations
///
/// Registered handlers take precedence over the built-in placeholder actions,
/// allowing deployments to wire real retry/restart/notification integrations.
pub trait ActionHandler: Send + Sync {
    fn execute<'a>(
        &'a self,
        context: &'a RemediationContext,
        config: &'a HashMap<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), RemediationError>> + Send + 'a>>;
}

/// Error-event fields relevant to remediation, derived 1:1 from an event
///
/// Created and discarded within a single orchestrator call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemediationContext {
    pub error_id: String,
    pub timestamp: Timestamp,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub endpoint: Option<String>,
    pub status_code: Option<u16>,
    pub user_agent: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl RemediationContext {
    /// Derive a remediation context from an error event
    pub fn from_event(event: &ErrorEvent) -> Self {
        Self {
            error_id: event.error_id.clone(),
            timestamp: event.timestamp,
            category: event.category,
            severity: event.severity,
            message: event.message.clone(),
            endpoint: event.endpoint.clone(),
            status_code: event.status_code,
            user_agent: event.user_agent.clone(),
            user_id: event.user_id.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

/// Outcome of executing one matched rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleExecutionResult {
    pub rule_id: String,
    /// True when every action of the rule executed successfully
    pub success: bool,
    /// Names of the actions that were attempted, in order
    pub actions_executed: Vec<String>,
    pub message: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Running counters for one rule
#[derive(Debug, Clone, Default)]
pub struct RuleStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_triggered: Option<Timestamp>,
}

/// State of a per-endpoint circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerEntry {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    failure_threshold: u32,
    success_threshold: u32,
    timeout: Duration,
    opened_at: Option<Instant>,
}

/// Engine that evaluates remediation rules and executes matching actions
///
/// The rule set is read-mostly configuration: it is assembled before the
/// engine is shared and only read during event processing. Circuit breakers
/// and rule statistics are the engine's only mutable state and sit behind
/// internal mutexes.
pub struct RemediationEngine {
    rules: Vec<RemediationRule>,
    handlers: HashMap<&'static str, Arc<dyn ActionHandler>>,
    stats: Mutex<HashMap<String, RuleStats>>,
    breakers: Mutex<HashMap<String, BreakerEntry>>,
}

impl Default for RemediationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RemediationEngine {
    /// Create an engine with no rules configured
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            handlers: HashMap::new(),
            stats: Mutex::new(HashMap::new()),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Create an engine pre-loaded with the default rule set
    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        for rule in crate::remediation::rules::default_rules() {
            engine.add_rule(rule);
        }
        engine
    }

    /// Add a rule, keeping the set ordered by priority (highest first)
    pub fn add_rule(&mut self, rule: RemediationRule) {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Register a custom handler for an action kind
    pub fn register_action_handler(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(kind.name(), handler);
    }

    /// Enable or disable a rule by id; returns false when the id is unknown
    pub fn set_rule_enabled(&mut self, rule_id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|rule| rule.id == rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Execution statistics for a rule, if it has ever matched
    pub fn rule_stats(&self, rule_id: &str) -> Option<RuleStats> {
        self.stats.lock().unwrap().get(rule_id).cloned()
    }

    /// Current circuit breaker state for an endpoint
    pub fn circuit_state(&self, endpoint: &str) -> Option<CircuitState> {
        self.breakers
            .lock()
            .unwrap()
            .get(endpoint)
            .map(|entry| entry.state)
    }

    /// Close all circuit breakers and forget their failure history
    pub fn reset_circuit_breakers(&self) {
        self.breakers.lock().unwrap().clear();
    }

    /// Evaluate every rule against the context and execute matching actions
    ///
    /// Matching rules run in priority order. A failing action is recorded but
    /// does not abort the remaining actions of its rule, and a failing rule
    /// never blocks other rules. Zero configured rules yield an empty result.
    pub async fn remediate(&self, context: &RemediationContext) -> Vec<RuleExecutionResult> {
        let mut results = Vec::new();

        for rule in self.rules.iter().filter(|rule| rule.enabled) {
            if !rule.matches(context) {
                continue;
            }

            debug!(
                "Rule '{}' matched error {} ({:?}/{:?})",
                rule.id, context.error_id, context.category, context.severity
            );

            let start = Instant::now();

            if self.is_breaker_open(context.endpoint.as_deref()) {
                let endpoint = context.endpoint.clone().unwrap_or_default();
                warn!(
                    "Skipping rule '{}': circuit breaker open for {}",
                    rule.id, endpoint
                );
                results.push(RuleExecutionResult {
                    rule_id: rule.id.clone(),
                    success: false,
                    actions_executed: Vec::new(),
                    message: format!("Circuit breaker open for endpoint: {}", endpoint),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some("CircuitBreakerOpen".to_string()),
                });
                continue;
            }

            let mut actions_executed = Vec::with_capacity(rule.actions.len());
            let mut first_error: Option<String> = None;

            for action in &rule.actions {
                if let Some(delay_ms) = action.delay_ms {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }

                actions_executed.push(action.kind.name().to_string());

                if let Err(e) = self.execute_action(action, context).await {
                    warn!(
                        "Action '{}' of rule '{}' failed for error {}: {}",
                        action.kind.name(),
                        rule.id,
                        context.error_id,
                        e
                    );
                    if first_error.is_none() {
                        first_error = Some(e.to_string());
                    }
                }
            }

            let success = first_error.is_none();
            self.record_rule_outcome(&rule.id, success);
            if success {
                self.record_breaker_success(context.endpoint.as_deref());
            } else {
                self.record_breaker_failure(context.endpoint.as_deref());
            }

            let message = if success {
                format!("Successfully executed {} action(s)", rule.actions.len())
            } else {
                format!(
                    "Executed {} action(s) with failures",
                    actions_executed.len()
                )
            };

            results.push(RuleExecutionResult {
                rule_id: rule.id.clone(),
                success,
                actions_executed,
                message,
                duration_ms: start.elapsed().as_millis() as u64,
                error: first_error,
            });
        }

        info!(
            "Remediation for error {}: {} rule(s) executed",
            context.error_id,
            results.len()
        );
        results
    }

    /// Execute one action, preferring a registered custom handler
    async fn execute_action(
        &self,
        action: &Action,
        context: &RemediationContext,
    ) -> Result<(), RemediationError> {
        if let Some(handler) = self.handlers.get(action.kind.name()) {
            return handler.execute(context, &action.config).await;
        }

        match action.kind {
            ActionKind::Retry => self.execute_retry(context, &action.config).await,
            ActionKind::CircuitBreaker => self.execute_circuit_breaker(context, &action.config),
            ActionKind::CacheBust => {
                info!("Busting cache for error {}", context.error_id);
                Ok(())
            }
            ActionKind::ResourceRestart => {
                info!("Requesting resource restart for error {}", context.error_id);
                Ok(())
            }
            ActionKind::ScaleUp => {
                info!("Requesting scale-up for error {}", context.error_id);
                Ok(())
            }
            ActionKind::Notify => {
                let channels = action
                    .config
                    .get("channels")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .unwrap_or_else(|| "slack, email".to_string());
                info!(
                    "Notifying [{}] about error {}: {}",
                    channels, context.error_id, context.message
                );
                Ok(())
            }
            ActionKind::Redirect => {
                let target = action.config.get("redirect_to").and_then(Value::as_str);
                match target {
                    Some(target) => {
                        info!(
                            "Redirecting traffic from {:?} to {} for error {}",
                            context.endpoint, target, context.error_id
                        );
                        Ok(())
                    }
                    None => Err(RemediationError::ActionFailed(
                        "redirect".to_string(),
                        "no redirect_to target configured".to_string(),
                    )),
                }
            }
            ActionKind::Fallback => {
                info!("Serving fallback response for error {}", context.error_id);
                Ok(())
            }
            ActionKind::Custom => Err(RemediationError::UnknownAction(
                "custom action without registered handler".to_string(),
            )),
        }
    }

    /// Built-in retry action
    ///
    /// The actual re-attempt is delegated to the reporting collaborator; this
    /// placeholder logs the intent so that deployments can wire a real retry
    /// integration via a custom handler.
    async fn execute_retry(
        &self,
        context: &RemediationContext,
        config: &HashMap<String, Value>,
    ) -> Result<(), RemediationError> {
        let max_retries = config
            .get("max_retries")
            .and_then(Value::as_u64)
            .unwrap_or(3);
        info!(
            "Scheduling retry (max {} attempts) for error {} on {:?}",
            max_retries, context.error_id, context.endpoint
        );
        Ok(())
    }

    /// Built-in circuit breaker action: record a failure against the endpoint
    fn execute_circuit_breaker(
        &self,
        context: &RemediationContext,
        config: &HashMap<String, Value>,
    ) -> Result<(), RemediationError> {
        let endpoint = match context.endpoint.as_deref() {
            Some(endpoint) => endpoint,
            None => {
                return Err(RemediationError::ActionFailed(
                    "circuitBreaker".to_string(),
                    "event has no endpoint to track".to_string(),
                ))
            }
        };

        let failure_threshold = config
            .get("failure_threshold")
            .and_then(Value::as_u64)
            .unwrap_or(5) as u32;
        let success_threshold = config
            .get("success_threshold")
            .and_then(Value::as_u64)
            .unwrap_or(3) as u32;
        let timeout_ms = config
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(60_000);

        let mut breakers = self.breakers.lock().unwrap();
        let entry = breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| BreakerEntry {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                failure_threshold,
                success_threshold,
                timeout: Duration::from_millis(timeout_ms),
                opened_at: None,
            });

        entry.failure_count += 1;
        if entry.state == CircuitState::Closed && entry.failure_count >= entry.failure_threshold {
            entry.state = CircuitState::Open;
            entry.opened_at = Some(Instant::now());
            info!("Circuit breaker opened for {}", endpoint);
        }

        Ok(())
    }

    /// Check whether the breaker for an endpoint is open, transitioning to
    /// half-open once its timeout has elapsed
    fn is_breaker_open(&self, endpoint: Option<&str>) -> bool {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => return false,
        };

        let mut breakers = self.breakers.lock().unwrap();
        let entry = match breakers.get_mut(endpoint) {
            Some(entry) => entry,
            None => return false,
        };

        if entry.state == CircuitState::Open {
            if let Some(opened_at) = entry.opened_at {
                if opened_at.elapsed() >= entry.timeout {
                    entry.state = CircuitState::HalfOpen;
                    entry.failure_count = 0;
                    entry.success_count = 0;
                    info!("Circuit breaker half-open for {}", endpoint);
                    return false;
                }
            }
            return true;
        }

        false
    }

    fn record_breaker_success(&self, endpoint: Option<&str>) {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => return,
        };

        let mut breakers = self.breakers.lock().unwrap();
        if let Some(entry) = breakers.get_mut(endpoint) {
            if entry.state == CircuitState::HalfOpen {
                entry.success_count += 1;
                if entry.success_count >= entry.success_threshold {
                    entry.state = CircuitState::Closed;
                    entry.failure_count = 0;
                    entry.success_count = 0;
                    entry.opened_at = None;
                    info!("Circuit breaker closed for {}", endpoint);
                }
            }
        }
    }

    fn record_breaker_failure(&self, endpoint: Option<&str>) {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => return,
        };

        let mut breakers = self.breakers.lock().unwrap();
        if let Some(entry) = breakers.get_mut(endpoint) {
            entry.failure_count += 1;
            if entry.state == CircuitState::HalfOpen {
                entry.state = CircuitState::Open;
                entry.opened_at = Some(Instant::now());
                info!("Circuit breaker re-opened for {}", endpoint);
            }
        }
    }

    fn record_rule_outcome(&self, rule_id: &str, success: bool) {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(rule_id.to_string()).or_default();
        if success {
            entry.success_count += 1;
        } else {
            entry.failure_count += 1;
        }
        entry.last_triggered = Some(chrono::Utc::now());
    }
}

impl crate::orchestrator::SystemReset for RemediationEngine {
    fn reset(&self) {
        self.reset_circuit_breakers();
    }
}

impl Remediator for RemediationEngine {
    fn remediate<'a>(
        &'a self,
        context: &'a RemediationContext,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RuleExecutionResult>, RemediationError>> + Send + 'a>>
    {
        Box::pin(async move { Ok(self.remediate(context).await) })
    }
}
