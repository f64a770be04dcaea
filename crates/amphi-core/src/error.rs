//! Error signal type.
//!
//! An [`ErrorSignal`] is the one *expected* failure in this layer: an
//! HTTP-shaped error a hook raises to reject a request. It is caught by
//! [`guard::safely`](crate::guard::safely) and rendered into a normal error
//! [`Reply`]; any other failure (a panic) is never caught here and
//! propagates to the server's own top-level handler.

use crate::Reply;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An HTTP-shaped failure raised by a hook: status code, headers, message.
///
/// # Example
///
/// ```
/// use amphi_core::ErrorSignal;
/// use http::StatusCode;
///
/// let signal = ErrorSignal::unauthorized("token expired");
/// assert_eq!(signal.status(), StatusCode::UNAUTHORIZED);
/// ```
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct ErrorSignal {
    status: StatusCode,
    headers: HeaderMap,
    message: String,
}

impl ErrorSignal {
    /// Creates an error signal with the given status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            message: message.into(),
        }
    }

    /// Creates a `400 Bad Request` signal.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a `401 Unauthorized` signal.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Creates a `403 Forbidden` signal.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// Creates a `404 Not Found` signal.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Creates a `409 Conflict` signal.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Creates a `429 Too Many Requests` signal.
    #[must_use]
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    /// Creates a `500 Internal Server Error` signal.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Returns a copy of this signal with an additional response header.
    ///
    /// Duplicate header names replace the earlier value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers attached to this signal.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns a machine-readable error code for the envelope.
    fn code(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "BAD_REQUEST",
            StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
            StatusCode::FORBIDDEN => "FORBIDDEN",
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::CONFLICT => "CONFLICT",
            StatusCode::TOO_MANY_REQUESTS => "RATE_LIMITED",
            StatusCode::INTERNAL_SERVER_ERROR => "INTERNAL_ERROR",
            _ => "ERROR",
        }
    }

    /// Converts this signal to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.message.clone(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }

    /// Renders this signal into a final error [`Reply`].
    ///
    /// The reply keeps the signal's status and headers and carries the JSON
    /// error envelope as its body.
    #[must_use]
    pub fn into_reply(self, request_id: Option<&str>) -> Reply {
        let envelope = self.to_envelope(request_id);
        let body = serde_json::to_string(&envelope).expect("failed to serialize error envelope");

        let mut headers = self.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Reply::new(self.status, headers, body)
    }
}

/// Serializable error envelope carried in error reply bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}
