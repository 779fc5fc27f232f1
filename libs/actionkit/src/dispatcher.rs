//! Per-request handler lifecycle: construct, inject, init, invoke.

use std::sync::Arc;

use tracing::Instrument;

use crate::action::{display_base_dir, handler_key};
use crate::context::{Collaborators, Context};
use crate::contracts::ErasedController;
use crate::error::DispatchError;
use crate::lifecycle::{Lifecycle, Phase};
use crate::registry::{HandlerEntry, HandlerRegistry};
use crate::request::RequestHandle;
use crate::response::{ResponseHandle, WrittenResponse};
use crate::router::RouteEntry;

/// Runs one routed action per call. Holds no per-request state.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: HandlerRegistry,
    shared: Arc<Collaborators>,
    base_dir: String,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry, shared: Arc<Collaborators>, base_dir: impl Into<String>) -> Self {
        Self {
            registry,
            shared,
            base_dir: base_dir.into(),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn dispatch(
        &self,
        route: &RouteEntry,
        request: RequestHandle,
    ) -> Result<WrittenResponse, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            handler = %route.action.handler(),
            action = %route.action.action(),
            method = %request.method(),
            path = %request.path(),
            request_id = %request.request_id(),
        );
        self.run(route, request).instrument(span).await
    }

    async fn run(
        &self,
        route: &RouteEntry,
        request: RequestHandle,
    ) -> Result<WrittenResponse, DispatchError> {
        let handler = route.action.handler();
        let action = route.action.action();

        let key = handler_key(&self.base_dir, handler);
        let entry = self.registry.get(&key).ok_or_else(|| {
            tracing::warn!(key = %key, "handler not registered");
            DispatchError::HandlerNotFound {
                handler: handler.to_string(),
                base_dir: display_base_dir(&self.base_dir),
            }
        })?;

        let mut instance = entry.instantiate().map_err(|source| {
            tracing::warn!(error = %source, "handler construction failed");
            DispatchError::Construct {
                handler: key.clone(),
                source,
            }
        })?;

        let mut lifecycle = Lifecycle::constructed(key.as_str());
        let response = Arc::new(ResponseHandle::new());
        let outcome = self
            .drive(
                entry,
                instance.as_mut(),
                &mut lifecycle,
                request,
                Arc::clone(&response),
                action,
            )
            .await;

        match outcome {
            Ok(written) => Ok(written),
            // A write that happened before the failure already decided the outcome.
            Err(err) => match response.take() {
                Some(written) => {
                    lifecycle.fail();
                    tracing::warn!(error = %err, "action failed after writing its response");
                    Ok(written)
                }
                None => {
                    let at = lifecycle.phase();
                    lifecycle.fail();
                    tracing::warn!(phase = %at, error = %err, "dispatch failed");
                    Err(err)
                }
            },
        }
    }

    async fn drive(
        &self,
        entry: &HandlerEntry,
        instance: &mut (dyn ErasedController + 'static),
        lifecycle: &mut Lifecycle,
        request: RequestHandle,
        response: Arc<ResponseHandle>,
        action: &str,
    ) -> Result<WrittenResponse, DispatchError> {
        if !entry.has_action(action) {
            return Err(DispatchError::ActionNotFound {
                handler: entry.name().to_string(),
                action: action.to_string(),
            });
        }

        let ctx = Context::builder()
            .shared(Arc::clone(&self.shared))
            .request(Arc::new(request))
            .response(Arc::clone(&response))
            .build();
        instance.erased_inject(Arc::new(ctx));
        lifecycle.advance(Phase::ContextInjected)?;

        instance
            .erased_init()
            .await
            .map_err(|source| DispatchError::Init {
                handler: entry.name().to_string(),
                source,
            })?;
        lifecycle.advance(Phase::Initialized)?;
        tracing::debug!("handler initialized");

        instance
            .erased_invoke(action)
            .await
            .map_err(|source| DispatchError::Action {
                handler: entry.name().to_string(),
                action: action.to_string(),
                source,
            })?;
        lifecycle.advance(Phase::MethodInvoked)?;

        let written = response.take().ok_or_else(|| DispatchError::NoResponse {
            handler: entry.name().to_string(),
            action: action.to_string(),
        })?;
        lifecycle.advance(Phase::ResponseEmitted)?;
        tracing::debug!(status = %written.status, "response emitted");
        Ok(written)
    }
}
