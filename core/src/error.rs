//! Error types for the API client.
//!
//! # Design
//! `ApiError` is what every client operation returns on failure. It mirrors
//! the envelope shape (status, message, raw data) so it can be turned into a
//! `ResponseEnvelope` at any boundary that prefers branching over `?`.
//! `TransportError` covers failures below HTTP semantics: the request never
//! produced a response, or could not be built in the first place.

use serde_json::Value;
use thiserror::Error;

use crate::envelope::{ErrorStatus, ResponseEnvelope};

pub const CANCELED_STATUS: u16 = 499;
pub const DEFAULT_ERROR_STATUS: u16 = 500;
pub const CANCELED_MESSAGE: &str = "Request canceled";
pub const UNKNOWN_MESSAGE: &str = "An unknown error occurred";

/// A failed API operation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    status: ErrorStatus,
    message: String,
    data: Option<Value>,
}

impl ApiError {
    pub fn new(status: impl Into<ErrorStatus>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach the raw error payload.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The request was cancelled through its cancellation token.
    pub fn canceled() -> Self {
        Self::new(CANCELED_STATUS, CANCELED_MESSAGE)
    }

    /// Catch-all for failures that are neither cancellation nor transport.
    pub fn unknown() -> Self {
        Self::new(DEFAULT_ERROR_STATUS, UNKNOWN_MESSAGE)
    }

    /// Build the error for a non-2xx response.
    ///
    /// The message comes from the body's `message` field when the body is a
    /// JSON object carrying a non-empty one; otherwise a generic status message is used.
    /// The body itself is kept as data, as JSON when it parses, else as text.
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let data = if body.is_empty() {
            None
        } else {
            Some(
                serde_json::from_slice::<Value>(body)
                    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned())),
            )
        };
        let message = data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status code {status}"));
        Self {
            status: ErrorStatus::Code(status),
            message,
            data,
        }
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn is_canceled(&self) -> bool {
        self.status == ErrorStatus::Code(CANCELED_STATUS)
    }

    /// Envelope carrying this error's status, message and raw data.
    pub fn to_response(&self) -> ResponseEnvelope<Value> {
        ResponseEnvelope::failure_with_data(self.status, self.message.clone(), self.data.clone())
    }

    /// Envelope of any payload type; the raw data is dropped.
    pub fn into_envelope<T>(self) -> ResponseEnvelope<T> {
        ResponseEnvelope::failure(self.status, self.message)
    }
}

/// Failures below HTTP semantics.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request was sent but no response came back.
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to encode request: {0}")]
    Encoding(String),

    #[error("failed to build transport: {0}")]
    Build(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Network(e) => match e.status() {
                Some(status) => ApiError::new(status.as_u16(), e.to_string()),
                None => ApiError::new(DEFAULT_ERROR_STATUS, e.to_string()),
            },
            TransportError::InvalidUrl { .. }
            | TransportError::InvalidHeader { .. }
            | TransportError::Encoding(_)
            | TransportError::Build(_) => ApiError::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Status;
    use serde_json::json;

    #[test]
    fn canceled_is_499() {
        let err = ApiError::canceled();
        assert_eq!(err.status(), ErrorStatus::Code(499));
        assert_eq!(err.message(), "Request canceled");
        assert!(err.is_canceled());
        assert!(err.data().is_none());
    }

    #[test]
    fn unknown_is_500_without_data() {
        let err = ApiError::unknown();
        assert_eq!(err.status(), ErrorStatus::Code(500));
        assert_eq!(err.message(), "An unknown error occurred");
        assert!(err.data().is_none());
    }

    #[test]
    fn from_status_takes_message_from_body() {
        let err = ApiError::from_status(404, br#"{"message":"not found"}"#);
        assert_eq!(err.status(), ErrorStatus::Code(404));
        assert_eq!(err.message(), "not found");
        assert_eq!(err.data(), Some(&json!({"message": "not found"})));
    }

    #[test]
    fn from_status_falls_back_to_generic_message() {
        let err = ApiError::from_status(502, b"bad gateway");
        assert_eq!(err.message(), "Request failed with status code 502");
        assert_eq!(err.data(), Some(&json!("bad gateway")));
    }

    #[test]
    fn from_status_ignores_non_string_message() {
        let err = ApiError::from_status(400, br#"{"message":{"field":"name"}}"#);
        assert_eq!(err.message(), "Request failed with status code 400");
    }

    #[test]
    fn from_status_ignores_empty_message() {
        let err = ApiError::from_status(400, br#"{"message":""}"#);
        assert_eq!(err.message(), "Request failed with status code 400");
        assert_eq!(err.data(), Some(&json!({"message": ""})));
    }

    #[test]
    fn from_status_empty_body_has_no_data() {
        let err = ApiError::from_status(503, b"");
        assert!(err.data().is_none());
    }

    #[test]
    fn to_response_keeps_data() {
        let err = ApiError::new(422, "invalid").with_data(json!({"field": "title"}));
        let envelope = err.to_response();
        assert_eq!(envelope.status(), Status::Error(ErrorStatus::Code(422)));
        assert_eq!(envelope.message(), "invalid");
        assert_eq!(envelope.data(), Some(&json!({"field": "title"})));
    }

    #[test]
    fn into_envelope_drops_data() {
        let err = ApiError::new(422, "invalid").with_data(json!({"field": "title"}));
        let envelope: ResponseEnvelope<String> = err.into_envelope();
        assert!(!envelope.is_success());
        assert!(envelope.data().is_none());
    }

    #[test]
    fn display_includes_status_and_message() {
        let err = ApiError::new(ErrorStatus::Generic, "boom");
        assert_eq!(err.to_string(), "error: boom");
        assert_eq!(ApiError::canceled().to_string(), "499: Request canceled");
    }

    #[test]
    fn build_failures_map_to_unknown() {
        let err: ApiError = TransportError::InvalidUrl {
            url: "::".to_string(),
            reason: "relative URL without a base".to_string(),
        }
        .into();
        assert_eq!(err, ApiError::unknown());
    }
}
