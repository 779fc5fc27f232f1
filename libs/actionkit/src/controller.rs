//! Response helpers available on every handler.

use axum::http::StatusCode;
use serde::Serialize;

use crate::contracts::Injectable;
use crate::envelope;
use crate::error::ApiError;

/// Writes the success and error envelopes into the current response.
///
/// Implemented for every [`Injectable`], so handlers get it for free.
pub trait ControllerExt: Injectable {
    /// 200 with `{"success":true,"data":<data>}`.
    fn success<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        self.success_with_status(data, StatusCode::OK)
    }

    fn success_with_status<T: Serialize>(&self, data: T, status: StatusCode) -> anyhow::Result<()> {
        let body = envelope::success_body(&data)?;
        self.base().response()?.send_json(status, body)?;
        Ok(())
    }

    /// Render `err` as the error envelope. Never fails; a rejected write is logged.
    fn error(&self, err: &ApiError) {
        let written = self
            .base()
            .response()
            .map_err(anyhow::Error::from)
            .and_then(|resp| {
                resp.send_json(err.status_code(), envelope::error_body(err))
                    .map_err(anyhow::Error::from)
            });
        if let Err(e) = written {
            tracing::warn!(error = %e, message = %err.message, "could not write error response");
        }
    }
}

impl<T: Injectable + ?Sized> ControllerExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Base;
    use crate::context::Context;
    use crate::request::RequestHandle;
    use crate::response::ResponseHandle;
    use axum::http::Method;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct Bare {
        base: Base,
    }

    impl Injectable for Bare {
        fn base(&self) -> &Base {
            &self.base
        }
        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    fn injected() -> (Bare, Arc<ResponseHandle>) {
        let response = Arc::new(ResponseHandle::new());
        let ctx = Context::builder()
            .request(Arc::new(RequestHandle::new(Method::GET, "/")))
            .response(Arc::clone(&response))
            .build();
        let mut h = Bare::default();
        h.inject(Arc::new(ctx));
        (h, response)
    }

    #[test]
    fn success_writes_envelope() {
        let (h, resp) = injected();
        h.success(json!({"rows": [1, 2, 3]})).unwrap();
        let w = resp.take().unwrap();
        assert_eq!(w.status, StatusCode::OK);
        assert_eq!(w.body, json!({"success": true, "data": {"rows": [1, 2, 3]}}));
    }

    #[test]
    fn success_with_custom_status() {
        let (h, resp) = injected();
        h.success_with_status("made", StatusCode::CREATED).unwrap();
        assert_eq!(resp.snapshot().unwrap().status, StatusCode::CREATED);
    }

    #[test]
    fn error_writes_envelope_with_its_status() {
        let (h, resp) = injected();
        h.error(&ApiError::full("Bad lang", 422, "LANG_MISSING"));
        let w = resp.take().unwrap();
        assert_eq!(w.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            w.body,
            json!({"success": false, "error": {"message": "Bad lang", "code": "LANG_MISSING"}})
        );
    }

    #[test]
    fn only_the_first_write_counts() {
        let (h, resp) = injected();
        h.success(1).unwrap();
        assert!(h.success(2).is_err());
        h.error(&ApiError::new("late"));
        assert_eq!(resp.snapshot().unwrap().body["data"], json!(1));
    }

    #[test]
    fn helpers_without_context() {
        let h = Bare::default();
        assert!(h.success(1).is_err());
        h.error(&ApiError::new("nowhere to go"));
    }
}
