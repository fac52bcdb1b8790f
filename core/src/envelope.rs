//! The uniform success/error wrapper returned by every client operation.
//!
//! # Design
//! `Status` is a tagged union: a request either succeeded or failed with an
//! `ErrorStatus`. On the wire it keeps the loose shape callers already know:
//! `"success"`, a numeric code, or the symbolic `"error"`.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

const SUCCESS: &str = "success";
const GENERIC_ERROR: &str = "error";

/// Why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    /// Numeric code, usually the HTTP status (499 for cancellation).
    Code(u16),
    /// Failure without a code, e.g. a failed `mfetch` operation.
    Generic,
}

impl ErrorStatus {
    /// The numeric code, if there is one.
    pub fn code(&self) -> Option<u16> {
        match self {
            ErrorStatus::Code(code) => Some(*code),
            ErrorStatus::Generic => None,
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStatus::Code(code) => write!(f, "{code}"),
            ErrorStatus::Generic => f.write_str(GENERIC_ERROR),
        }
    }
}

impl From<u16> for ErrorStatus {
    fn from(code: u16) -> Self {
        ErrorStatus::Code(code)
    }
}

/// Outcome tag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Error(ErrorStatus),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl From<ErrorStatus> for Status {
    fn from(status: ErrorStatus) -> Self {
        Status::Error(status)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str(SUCCESS),
            Status::Error(status) => status.fmt(f),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Status::Success => serializer.serialize_str(SUCCESS),
            Status::Error(ErrorStatus::Code(code)) => serializer.serialize_u16(*code),
            Status::Error(ErrorStatus::Generic) => serializer.serialize_str(GENERIC_ERROR),
        }
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl Visitor<'_> for StatusVisitor {
            type Value = Status;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"success\", \"error\" or a numeric status code")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Status, E> {
                u16::try_from(v)
                    .map(|code| Status::Error(ErrorStatus::Code(code)))
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Status, E> {
                u16::try_from(v)
                    .map(|code| Status::Error(ErrorStatus::Code(code)))
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Status, E> {
                match v {
                    SUCCESS => Ok(Status::Success),
                    GENERIC_ERROR => Ok(Status::Error(ErrorStatus::Generic)),
                    other => other
                        .parse::<u16>()
                        .map(|code| Status::Error(ErrorStatus::Code(code)))
                        .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// `{ status, message, data }` wrapper around an operation's outcome.
///
/// Built by [`ApiSuccess::create_response`] on the success path and by
/// [`crate::ApiError::to_response`] / [`crate::ApiError::into_envelope`] on
/// the failure path. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    status: Status,
    message: String,
    data: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    pub(crate) fn success(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data,
        }
    }

    /// A failed envelope without a payload.
    pub fn failure(status: ErrorStatus, message: impl Into<String>) -> Self {
        Self {
            status: Status::Error(status),
            message: message.into(),
            data: None,
        }
    }

    pub(crate) fn failure_with_data(
        status: ErrorStatus,
        message: impl Into<String>,
        data: Option<T>,
    ) -> Self {
        Self {
            status: Status::Error(status),
            message: message.into(),
            data,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Builds success envelopes with a shared message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSuccess {
    message: String,
}

impl ApiSuccess {
    pub const DEFAULT_MESSAGE: &'static str = "Operation completed successfully";

    pub fn new() -> Self {
        Self::with_message(Self::DEFAULT_MESSAGE)
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn create_response<T>(&self, data: Option<T>) -> ResponseEnvelope<T> {
        ResponseEnvelope::success(self.message.clone(), data)
    }
}

impl Default for ApiSuccess {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_success_message() {
        let envelope = ApiSuccess::new().create_response(Some(7));
        assert_eq!(envelope.status(), Status::Success);
        assert_eq!(envelope.message(), "Operation completed successfully");
        assert_eq!(envelope.data(), Some(&7));
    }

    #[test]
    fn success_without_payload() {
        let envelope: ResponseEnvelope<()> =
            ApiSuccess::with_message("Deleted").create_response(None);
        assert!(envelope.is_success());
        assert!(envelope.data().is_none());
    }

    #[test]
    fn success_serializes_as_string_status() {
        let envelope = ApiSuccess::new().create_response(Some("hello"));
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], "hello");
    }

    #[test]
    fn code_serializes_as_number() {
        let envelope: ResponseEnvelope<()> = ResponseEnvelope::failure(404.into(), "not found");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["message"], "not found");
        assert!(json["data"].is_null());
    }

    #[test]
    fn generic_error_serializes_as_error() {
        let envelope: ResponseEnvelope<()> = ResponseEnvelope::failure(ErrorStatus::Generic, "boom");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["status"], "error");
    }

    #[test]
    fn status_parses_every_wire_form() {
        let success: Status = serde_json::from_str(r#""success""#).unwrap();
        assert_eq!(success, Status::Success);
        let generic: Status = serde_json::from_str(r#""error""#).unwrap();
        assert_eq!(generic, Status::Error(ErrorStatus::Generic));
        let numeric: Status = serde_json::from_str("503").unwrap();
        assert_eq!(numeric, Status::Error(ErrorStatus::Code(503)));
        let numeric_string: Status = serde_json::from_str(r#""418""#).unwrap();
        assert_eq!(numeric_string, Status::Error(ErrorStatus::Code(418)));
    }

    #[test]
    fn status_rejects_unknown_string() {
        let result: Result<Status, _> = serde_json::from_str(r#""pending""#);
        assert!(result.is_err());
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::Success.to_string(), "success");
        assert_eq!(Status::Error(ErrorStatus::Code(499)).to_string(), "499");
        assert_eq!(Status::Error(ErrorStatus::Generic).to_string(), "error");
    }
}
