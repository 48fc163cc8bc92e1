/// Error types for the triage subsystems
pub mod error;

/// Core error-event types
pub mod events;

/// Rule-driven automated remediation
pub mod remediation;

/// Alert routing to responding teams
pub mod routing;

/// Capacity-scaling prediction
pub mod scaling;

/// Sliding-window error-rate tracking
pub mod rates;

/// Delivery of events to the external logging collaborator
pub mod sink;

/// Coordination root tying the stages together
pub mod orchestrator;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{ConfigError, PredictionError, RemediationError, RoutingError, SinkError};
