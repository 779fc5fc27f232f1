//! Error types shared by the dispatcher and by handler code.
//!
//! [`ApiError`] is the user-facing failure: it carries the message, the HTTP
//! status and an application code, and always renders as the JSON error
//! envelope. [`DispatchError`] covers everything that can go wrong while a
//! route is being resolved and run.

use std::fmt;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status used when an [`ApiError`] is built without an explicit one.
pub const DEFAULT_ERROR_STATUS: u16 = 400;

/// Application-specific error code: either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Int(i64),
    Str(String),
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::Int(0)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Int(n) => write!(f, "{n}"),
            ErrorCode::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(v: i64) -> Self {
        ErrorCode::Int(v)
    }
}

impl From<i32> for ErrorCode {
    fn from(v: i32) -> Self {
        ErrorCode::Int(v.into())
    }
}

impl From<&str> for ErrorCode {
    fn from(v: &str) -> Self {
        ErrorCode::Str(v.to_string())
    }
}

impl From<String> for ErrorCode {
    fn from(v: String) -> Self {
        ErrorCode::Str(v)
    }
}

/// Expected, user-facing failure.
///
/// Handlers return it (usually through `anyhow`) or render it directly with
/// [`ControllerExt::error`](crate::controller::ControllerExt::error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub code: ErrorCode,
}

impl ApiError {
    /// Error with the default status (400) and code (0).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: DEFAULT_ERROR_STATUS,
            code: ErrorCode::default(),
        }
    }

    pub fn full(message: impl Into<String>, status: u16, code: impl Into<ErrorCode>) -> Self {
        Self {
            message: message.into(),
            status,
            code: code.into(),
        }
    }

    /// 500 with code `INTERNAL`; used for failures the caller cannot fix.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::full(message, 500, "INTERNAL")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = code.into();
        self
    }

    /// HTTP status to emit, taken as given. Unset (0), informational and
    /// out-of-range values fall back to 400.
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status)
            .ok()
            .filter(|s| (200..600).contains(&s.as_u16()))
            .unwrap_or(StatusCode::BAD_REQUEST)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        crate::envelope::error_response(&self)
    }
}

/// Failure while resolving or running a routed action.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Not found '{handler}' in {base_dir}")]
    HandlerNotFound { handler: String, base_dir: String },

    #[error("Not found '{action}' in {handler}")]
    ActionNotFound { handler: String, action: String },

    #[error("failed to construct handler '{handler}'")]
    Construct {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("init failed for handler '{handler}'")]
    Init {
        handler: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("action '{handler}@{action}' failed")]
    Action {
        handler: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("action '{handler}@{action}' completed without writing a response")]
    NoResponse { handler: String, action: String },

    #[error("response already sent for this request")]
    ResponseAlreadySent,

    #[error("no route for {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Lifecycle(#[from] crate::lifecycle::PhaseError),
}

impl DispatchError {
    /// The user-facing error carried by this failure, if any.
    ///
    /// Looks through the `anyhow` chain of construct/init/action failures so
    /// that an [`ApiError`] raised with `?` deep inside an action is still
    /// recognized.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            DispatchError::Construct { source, .. }
            | DispatchError::Init { source, .. }
            | DispatchError::Action { source, .. } => {
                source.chain().find_map(|e| e.downcast_ref::<ApiError>())
            }
            _ => None,
        }
    }

    /// Whether this is a routing/configuration fault rather than a runtime one.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::HandlerNotFound { .. }
                | DispatchError::ActionNotFound { .. }
                | DispatchError::RouteNotFound { .. }
        )
    }
}
