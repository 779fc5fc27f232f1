//! Single-write response slot shared between the dispatcher and a handler.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::DispatchError;

/// What a handler wrote for its request.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for WrittenResponse {
    fn into_response(self) -> Response {
        crate::envelope::json_response(self.status, self.body)
    }
}

#[derive(Debug)]
enum Slot {
    Empty,
    Written(WrittenResponse),
    Taken,
}

/// The in-flight response. Accepts exactly one write.
#[derive(Debug)]
pub struct ResponseHandle {
    slot: Mutex<Slot>,
}

impl Default for ResponseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandle {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Record the response. A second call fails and leaves the first write intact.
    pub fn send_json(&self, status: StatusCode, body: Value) -> Result<(), DispatchError> {
        let mut slot = self.slot.lock();
        match *slot {
            Slot::Empty => {
                *slot = Slot::Written(WrittenResponse { status, body });
                Ok(())
            }
            Slot::Written(_) | Slot::Taken => Err(DispatchError::ResponseAlreadySent),
        }
    }

    pub fn is_sent(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Empty)
    }

    /// Copy of the written response, if any, without consuming it.
    pub fn snapshot(&self) -> Option<WrittenResponse> {
        match &*self.slot.lock() {
            Slot::Written(w) => Some(w.clone()),
            _ => None,
        }
    }

    /// Move the written response out for the transport. Later writes still fail.
    pub fn take(&self) -> Option<WrittenResponse> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Written(w) => Some(w),
            Slot::Empty => {
                *slot = Slot::Empty;
                None
            }
            Slot::Taken => None,
        }
    }
}
