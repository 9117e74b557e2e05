use serde_json::Value as JsonValue;

/// Failure returned by every client call.
///
/// The `Display` text is the human-readable message shown to the user;
/// [`ApiError::retryable`] tells the UI whether to offer a manual retry.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server answered 401. The session guard has already been notified.
    #[error("Session expired, please log in again")]
    SessionExpired,
    /// Business error reported by the server with a JSON error body.
    #[error("{message}")]
    Server {
        status: u16,
        /// Server-supplied message, passed through unmodified.
        message: String,
        /// Server-supplied structured details, passed through unmodified.
        details: Option<JsonValue>,
    },
    /// Non-success status whose body was not JSON (proxy pages, cold-start
    /// artifacts).
    #[error("Server error ({status})")]
    ServerError { status: u16 },
    /// Success status with a body that is not JSON.
    #[error("Unexpected response from server ({status})")]
    UnexpectedResponse { status: u16, reason: String },
    /// Every attempt ended in 503.
    #[error("Server is still starting up, please wait a moment and try again")]
    StillStarting,
    /// The last attempt hit the request timeout.
    #[error("Request timed out, the server may be starting up")]
    TimedOut,
    /// The last attempt failed before any response arrived.
    #[error("Unable to reach server, check your connection")]
    Unreachable {
        #[source]
        source: reqwest::Error,
    },
    /// The payload was JSON but did not match the caller's expected type.
    #[error("Unexpected response shape: {0}")]
    Decode(#[source] serde_json::Error),
    /// The request could not be built (bad URL, unserializable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether reissuing the same request later may succeed.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. } | Self::StillStarting | Self::TimedOut | Self::Unreachable { .. }
        )
    }

    /// Server-supplied details of a business error.
    pub fn details(&self) -> Option<&JsonValue> {
        match self {
            Self::Server { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// HTTP status of the response that produced this failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SessionExpired => Some(401),
            Self::StillStarting => Some(503),
            Self::Server { status, .. }
            | Self::ServerError { status }
            | Self::UnexpectedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message, identical to the `Display` output.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
