//! Rule-driven automated remediation
//!
//! This module evaluates condition/action rules against incoming error events
//! and executes matching corrective actions, isolating failures so that one
//! misbehaving action never blocks another rule.

mod engine;
mod rules;

pub use engine::{
    ActionHandler, CircuitState, RemediationContext, RemediationEngine, Remediator,
    RuleExecutionResult, RuleStats,
};
pub use rules::{
    default_rules, Action, ActionKind, Condition, ConditionField, ConditionOperator,
    RemediationRule,
};
