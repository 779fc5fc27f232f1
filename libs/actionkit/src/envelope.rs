//! Fixed JSON shapes returned to callers.
//!
//! Success: `{"success":true,"data":<json>}`
//! Error:   `{"success":false,"error":{"message":<string>,"code":<string|number>}}`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ErrorCode};

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    success: bool,
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: ErrorPayload<'a>,
}

#[derive(Serialize)]
struct ErrorPayload<'a> {
    message: &'a str,
    code: &'a ErrorCode,
}

pub fn success_body<T: Serialize>(data: &T) -> serde_json::Result<Value> {
    serde_json::to_value(SuccessEnvelope {
        success: true,
        data,
    })
}

pub fn error_body(err: &ApiError) -> Value {
    let envelope = ErrorEnvelope {
        success: false,
        error: ErrorPayload {
            message: &err.message,
            code: &err.code,
        },
    };
    // Only strings and integers inside; serialization cannot fail.
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}

pub fn error_response(err: &ApiError) -> Response {
    (err.status_code(), Json(error_body(err))).into_response()
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_shape() {
        let body = success_body(&json!({"rows": [1, 2, 3]})).unwrap();
        assert_eq!(body, json!({"success": true, "data": {"rows": [1, 2, 3]}}));
    }

    #[test]
    fn error_shape_with_string_code() {
        let body = error_body(&ApiError::full("Bad lang", 422, "LANG_MISSING"));
        assert_eq!(
            body,
            json!({"success": false, "error": {"message": "Bad lang", "code": "LANG_MISSING"}})
        );
    }

    #[test]
    fn error_shape_with_default_code() {
        let body = error_body(&ApiError::new("nope"));
        assert_eq!(body["error"]["code"], json!(0));
    }

    #[test]
    fn error_response_uses_error_status() {
        let resp = error_response(&ApiError::full("Bad lang", 422, "LANG_MISSING"));
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
