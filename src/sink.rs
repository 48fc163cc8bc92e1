//! Delivery of error events to the external logging collaborator
//!
//! The orchestrator treats durable storage of error records as another
//! system's concern: events are posted as JSON to a configured HTTP endpoint
//! and delivery failures never fail event processing.

use crate::error::SinkError;
use crate::events::{ErrorCategory, ErrorEvent, ErrorSeverity, Timestamp};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Trait for the event-logging stage of the processing pipeline
pub trait ErrorLogSink: Send + Sync {
    fn log_event<'a>(
        &'a self,
        event: &'a ErrorEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>>;
}

/// Wire payload for the logging endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogPayload<'a> {
    error_id: &'a str,
    category: ErrorCategory,
    severity: ErrorSeverity,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    metadata: &'a HashMap<String, Value>,
    timestamp: Timestamp,
}

impl<'a> LogPayload<'a> {
    fn from_event(event: &'a ErrorEvent) -> Self {
        Self {
            error_id: &event.error_id,
            category: event.category,
            severity: event.severity,
            message: &event.message,
            endpoint: event.endpoint.as_deref(),
            status_code: event.status_code,
            user_agent: event.user_agent.as_deref(),
            user_id: event.user_id.as_deref(),
            metadata: &event.metadata,
            timestamp: event.timestamp,
        }
    }
}

/// Posts error events to an HTTP logging endpoint
pub struct HttpErrorLogSink {
    client: Client,
    endpoint: String,
}

impl HttpErrorLogSink {
    /// Create a sink targeting the given endpoint URL
    pub fn new(endpoint: String) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, endpoint })
    }

    /// The configured endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ErrorLogSink for HttpErrorLogSink {
    fn log_event<'a>(
        &'a self,
        event: &'a ErrorEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            let payload = LogPayload::from_event(event);
            let response = self
                .client
                .post(&self.endpoint)
                .json(&payload)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(SinkError::Rejected(response.status().as_u16()));
            }
            Ok(())
        })
    }
}

/// Sink that records nothing remotely
///
/// Used when no logging endpoint is configured; events are still visible in
/// local diagnostics at debug level.
#[derive(Debug, Default)]
pub struct NullErrorLogSink;

impl ErrorLogSink for NullErrorLogSink {
    fn log_event<'a>(
        &'a self,
        event: &'a ErrorEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'a>> {
        Box::pin(async move {
            log::debug!(
                "No logging endpoint configured, dropping event {}",
                event.error_id
            );
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_uses_wire_field_names() {
        let event = ErrorEvent::new(
            "err-9",
            ErrorCategory::ExternalApi,
            ErrorSeverity::High,
            "upstream timed out",
        )
        .with_endpoint("/api/flights")
        .with_status_code(504)
        .with_metadata("provider", Value::from("acme-air"));

        let json = serde_json::to_value(LogPayload::from_event(&event)).unwrap();

        assert_eq!(json["errorId"], "err-9");
        assert_eq!(json["category"], "EXTERNAL_API");
        assert_eq!(json["severity"], "high");
        assert_eq!(json["statusCode"], 504);
        assert_eq!(json["endpoint"], "/api/flights");
        assert_eq!(json["metadata"]["provider"], "acme-air");
        assert!(json.get("userAgent").is_none());
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_sink_construction() {
        let sink = HttpErrorLogSink::new("http://localhost:9200/errors".to_string()).unwrap();
        assert_eq!(sink.endpoint(), "http://localhost:9200/errors");
    }
}
