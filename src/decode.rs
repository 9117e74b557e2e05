use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::{
    retry::{is_retryable_status, AttemptError, Transient},
    ApiError,
};

/// Interprets a received response that is not a 401.
pub(crate) fn decode_response(status: StatusCode, body: &str) -> Result<JsonValue, AttemptError> {
    if status.is_success() {
        return decode_success_body(status, body).map_err(AttemptError::Terminal);
    }

    if is_retryable_status(status) {
        return Err(AttemptError::Transient(Transient::Unavailable));
    }

    Err(AttemptError::Terminal(decode_error_body(status, body)))
}

/// Converts a successful JSON payload into the caller's type.
pub(crate) fn decode_payload<T: DeserializeOwned>(payload: JsonValue) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(ApiError::Decode)
}

fn decode_success_body(status: StatusCode, body: &str) -> Result<JsonValue, ApiError> {
    if body.trim().is_empty() {
        return Ok(JsonValue::Null);
    }
    serde_json::from_str(body).map_err(|err| ApiError::UnexpectedResponse {
        status: status.as_u16(),
        reason: err.to_string(),
    })
}

fn decode_error_body(status: StatusCode, body: &str) -> ApiError {
    let Ok(parsed) = serde_json::from_str::<JsonValue>(body) else {
        return ApiError::ServerError {
            status: status.as_u16(),
        };
    };

    let message = error_message(&parsed)
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
    let details = parsed.get("details").filter(|value| !value.is_null()).cloned();

    ApiError::Server {
        status: status.as_u16(),
        message,
        details,
    }
}

fn error_message(body: &JsonValue) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(field))
        .find_map(|value| value.as_str().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{decode_payload, decode_response};
    use crate::{
        retry::{AttemptError, Transient},
        ApiError,
    };

    #[test]
    fn success_json_passes_through_any_shape() {
        let value = decode_response(StatusCode::OK, r#"{"a":1}"#).expect("must decode");
        assert_eq!(value, json!({ "a": 1 }));

        let value = decode_response(StatusCode::CREATED, "[1,2]").expect("must decode");
        assert_eq!(value, json!([1, 2]));
    }

    #[test]
    fn empty_success_body_is_null() {
        let value = decode_response(StatusCode::NO_CONTENT, "").expect("must decode");
        assert!(value.is_null());
    }

    #[test]
    fn garbage_success_body_is_not_retryable() {
        let err = decode_response(StatusCode::OK, "<html>oops</html>").expect_err("must fail");
        match err {
            AttemptError::Terminal(err @ ApiError::UnexpectedResponse { .. }) => {
                assert!(!err.retryable());
                assert_eq!(err.status(), Some(200));
            }
            other => panic!("expected unexpected response, got {other:?}"),
        }
    }

    #[test]
    fn garbage_error_body_is_retryable_server_error() {
        let err = decode_response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>")
            .expect_err("must fail");
        match err {
            AttemptError::Terminal(err @ ApiError::ServerError { status: 502 }) => {
                assert!(err.retryable());
                assert_eq!(err.message(), "Server error (502)");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn service_unavailable_is_transient_regardless_of_body() {
        let err = decode_response(StatusCode::SERVICE_UNAVAILABLE, r#"{"error":"booting"}"#)
            .expect_err("must fail");
        assert!(matches!(err, AttemptError::Transient(Transient::Unavailable)));
    }

    #[test]
    fn business_error_keeps_server_message_and_details() {
        let body = r#"{"error":"Customer not found","details":{"id":17}}"#;
        let err = decode_response(StatusCode::NOT_FOUND, body).expect_err("must fail");
        match err {
            AttemptError::Terminal(err) => {
                assert_eq!(err.message(), "Customer not found");
                assert_eq!(err.details(), Some(&json!({ "id": 17 })));
                assert!(!err.retryable());
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[test]
    fn message_field_is_used_when_error_field_is_missing() {
        let err = decode_response(StatusCode::CONFLICT, r#"{"message":"Slot taken"}"#)
            .expect_err("must fail");
        match err {
            AttemptError::Terminal(err) => assert_eq!(err.message(), "Slot taken"),
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[test]
    fn json_error_without_message_gets_status_fallback() {
        let err = decode_response(StatusCode::BAD_REQUEST, "{}").expect_err("must fail");
        match err {
            AttemptError::Terminal(err) => {
                assert_eq!(err.message(), "Request failed (400)");
                assert_eq!(err.details(), None);
            }
            other => panic!("expected terminal error, got {other:?}"),
        }
    }

    #[test]
    fn payload_type_mismatch_is_decode_error() {
        #[derive(Debug, serde::Deserialize)]
        struct Points {
            #[allow(dead_code)]
            balance: u64,
        }

        let err = decode_payload::<Points>(json!({ "balance": "lots" })).expect_err("must fail");
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!err.retryable());
    }
}
