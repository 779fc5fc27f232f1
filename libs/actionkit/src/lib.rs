//! # ActionKit - `Handler@action` dispatch for axum
//!
//! Routes are declared as strings naming a handler type and one of its
//! actions. For each request the handler is built fresh, receives the
//! per-request [`Context`], runs its optional `init` hook and then the named
//! action, which writes the response through the [`ControllerExt`] helpers.
//!
//! ## Example
//!
//! ```rust,ignore
//! use actionkit::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Greeting {
//!     base: Base,
//! }
//!
//! impl Injectable for Greeting {
//!     fn base(&self) -> &Base { &self.base }
//!     fn base_mut(&mut self) -> &mut Base { &mut self.base }
//! }
//!
//! impl Initializable for Greeting {}
//!
//! #[async_trait]
//! impl Controller for Greeting {
//!     const ACTIONS: &'static [&'static str] = &["hello"];
//!
//!     async fn invoke(&mut self, action: &str) -> anyhow::Result<()> {
//!         let messages = BTreeMap::from([("en", "Hi"), ("fr", "Salut")]);
//!         match self.base.localize(&messages) {
//!             Ok(text) => self.success(text),
//!             Err(e) => Ok(self.error(&e)),
//!         }
//!     }
//! }
//!
//! register_controller!(Greeting, "Greeting");
//!
//! let mut router = ActionRouter::new(RouterConfig::default())
//!     .with_registry(HandlerRegistry::discover_and_build()?);
//! router.get("/hello", "Greeting@hello")?;
//! let app: axum::Router = router.into_axum();
//! ```

pub use async_trait::async_trait;

// Re-export inventory for register_controller!
pub use inventory;

pub mod action;
pub mod base;
pub mod context;
pub mod contracts;
pub mod controller;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;

pub use action::{ActionParseError, ActionRef};
pub use base::{Base, DefaultLang, DEFAULT_LANG};
pub use context::{Collaborators, Context, ContextBuilder, ContextError};
pub use contracts::{unknown_action, Controller, Initializable, Injectable, Model};
pub use controller::ControllerExt;
pub use dispatcher::Dispatcher;
pub use error::{ApiError, DispatchError, ErrorCode};
pub use lifecycle::{Lifecycle, Phase, PhaseError};
pub use registry::{HandlerRegistry, RegistryBuilder, RegistryError};
pub use request::RequestHandle;
pub use response::{ResponseHandle, WrittenResponse};
pub use router::{
    ActionRouter, DefaultErrorChannel, ErrorChannel, RouteEntry, RouteError, RouterConfig,
};

/// Everything a handler module usually needs.
pub mod prelude {
    pub use crate::register_controller;
    pub use crate::{
        async_trait, ActionRouter, ApiError, Base, Controller, ControllerExt, HandlerRegistry,
        Initializable, Injectable, Model, RouterConfig,
    };
    pub use std::collections::BTreeMap;
}
