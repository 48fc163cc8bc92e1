use thiserror::Error;

/// Errors that can occur while executing remediation actions
#[derive(Error, Debug)]
pub enum RemediationError {
    #[error("Action '{0}' failed: {1}")]
    ActionFailed(String, String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("Circuit breaker open for endpoint: {0}")]
    CircuitOpen(String),

    #[error("Invalid rule condition: {0}")]
    InvalidCondition(String),
}

/// Errors that can occur during alert routing
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Team registry is empty")]
    EmptyRegistry,

    #[error("Routing aborted: {0}")]
    Aborted(String),
}

/// Errors that can occur during scaling prediction
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Metrics source failed: {0}")]
    MetricsUnavailable(String),

    #[error("Prediction aborted: {0}")]
    Aborted(String),
}

/// Errors that can occur when delivering events to the logging collaborator
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Logging endpoint rejected event with status {0}")]
    Rejected(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
