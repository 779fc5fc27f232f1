//! State and helpers shared by every handler and model.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::{Context, ContextError};
use crate::contracts::{Initializable, Injectable, Model};
use crate::error::ApiError;
use crate::request::RequestHandle;
use crate::response::ResponseHandle;

/// Language used by [`Base::localize`] when the request names none.
pub const DEFAULT_LANG: &str = "en";

/// Query parameter and body field carrying the requested language.
pub const LANG_PARAM: &str = "lang";

/// Process-wide override of [`DEFAULT_LANG`], stored as a collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultLang(pub String);

/// Embedded in handlers and models; holds the injected context.
#[derive(Debug, Default, Clone)]
pub struct Base {
    ctx: Option<Arc<Context>>,
}

impl Base {
    pub fn inject(&mut self, ctx: Arc<Context>) {
        self.ctx = Some(ctx);
    }

    pub fn is_injected(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn context(&self) -> Result<&Arc<Context>, ApiError> {
        self.ctx.as_ref().ok_or_else(|| ContextError::Missing.into())
    }

    pub fn request(&self) -> Result<&RequestHandle, ApiError> {
        Ok(self.context()?.request())
    }

    pub fn response(&self) -> Result<&ResponseHandle, ApiError> {
        Ok(self.context()?.response())
    }

    /// Typed lookup of a process-wide collaborator.
    pub fn collaborator<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ApiError> {
        self.context()?
            .collaborator::<T>()
            .ok_or_else(|| ContextError::Collaborator(std::any::type_name::<T>()).into())
    }

    /// Build a dependent model that shares this context, then run its `init`.
    pub async fn create_dependent<M, F>(&self, build: F) -> anyhow::Result<M>
    where
        M: Model,
        F: FnOnce() -> M + Send,
    {
        self.try_create_dependent(|| Ok(build())).await
    }

    /// Like [`create_dependent`](Self::create_dependent) for fallible constructors.
    pub async fn try_create_dependent<M, F>(&self, build: F) -> anyhow::Result<M>
    where
        M: Model,
        F: FnOnce() -> anyhow::Result<M> + Send,
    {
        let ctx = Arc::clone(self.context()?);
        let mut dependent = build()?;
        dependent.inject(ctx);
        dependent.init().await?;
        tracing::debug!(model = std::any::type_name::<M>(), "dependent created");
        Ok(dependent)
    }

    /// Language requested by the caller: query `lang`, then body `lang`, then the default.
    pub fn lang(&self) -> Result<String, ApiError> {
        let ctx = self.context()?;
        let req = ctx.request();
        if let Some(lang) = req.query_param(LANG_PARAM).filter(|l| !l.is_empty()) {
            return Ok(lang.to_string());
        }
        if let Some(lang) = req
            .body_field(LANG_PARAM)
            .and_then(|v| v.as_str())
            .filter(|l| !l.is_empty())
        {
            return Ok(lang.to_string());
        }
        Ok(ctx
            .collaborator::<DefaultLang>()
            .map(|d| d.0.clone())
            .unwrap_or_else(|| DEFAULT_LANG.to_string()))
    }

    /// Pick the message for the requested language.
    pub fn localize(&self, messages: &BTreeMap<&str, &str>) -> Result<String, ApiError> {
        let lang = self.lang()?;
        match messages.get(lang.as_str()) {
            Some(msg) => Ok((*msg).to_string()),
            None => {
                let map = serde_json::to_string(messages).unwrap_or_default();
                Err(ApiError::full(
                    format!("Not found '{lang}' in {map}"),
                    400,
                    "LANG_MISSING",
                ))
            }
        }
    }
}
