//! Core event types for the error triage orchestrator
//!
//! This module defines the fundamental data structures used throughout the
//! application for representing reported error events and their classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Classification of a reported error by its originating subsystem
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Connectivity or transport-level failures
    Network,
    /// Database access or query failures
    Database,
    /// Failures from third-party API integrations
    ExternalApi,
    /// Input or business-rule validation failures
    Validation,
    /// Authentication or authorization failures
    Authentication,
    /// Misconfiguration detected at runtime
    Configuration,
    /// Anything that could not be classified
    Unknown,
}

/// Severity of a reported error, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Cosmetic or fully recoverable issue
    Low,
    /// Degraded behavior worth tracking
    Medium,
    /// Significant failure requiring human attention
    High,
    /// Outage-level failure requiring immediate response
    Critical,
}

/// One reported fault occurrence
///
/// Created once by the reporting collaborator and passed by value through the
/// processing pipeline, never mutated. The orchestrator does not persist
/// events; durable storage is the logging collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEvent {
    /// Caller-supplied unique identifier, used for correlation across results
    pub error_id: String,
    /// When the error occurred
    pub timestamp: Timestamp,
    /// Error classification
    pub category: ErrorCategory,
    /// Error severity
    pub severity: ErrorSeverity,
    /// Human-readable description of the fault
    pub message: String,
    /// Endpoint or route where the error surfaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// HTTP status code associated with the failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// User agent of the affected request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Identifier of the affected user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Identifier of the affected session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Component that reported the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Captured stack trace, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Open key/value bag for extensibility
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ErrorEvent {
    /// Create an event with the required fields and no optional context
    pub fn new(
        error_id: impl Into<String>,
        category: ErrorCategory,
        severity: ErrorSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_id: error_id.into(),
            timestamp: Utc::now(),
            category,
            severity,
            message: message.into(),
            endpoint: None,
            status_code: None,
            user_agent: None,
            user_id: None,
            session_id: None,
            component: None,
            stack_trace: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach an endpoint to the event
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Attach a status code to the event
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Attach a metadata entry to the event
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl ErrorCategory {
    /// All known categories, useful for iteration in tests and telemetry
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Network,
        ErrorCategory::Database,
        ErrorCategory::ExternalApi,
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Configuration,
        ErrorCategory::Unknown,
    ];
}
