//! Per-request context handed to handlers.
//!
//! A [`Context`] always holds the in-flight request and response plus the
//! process-wide [`Collaborators`] configured when the router was built. It is
//! assembled through [`ContextBuilder`], whose type parameters track whether
//! the request and response were supplied; `build()` only exists once both are.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::ApiError;
use crate::request::RequestHandle;
use crate::response::ResponseHandle;

/// Type-state markers for [`ContextBuilder`].
pub mod state {
    /// Marker for a slot that has not been filled yet.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Missing;
}

pub use state::Missing;

/// Process-wide shared values (connection pools, clients, settings), keyed by type.
///
/// Filled once while the router is built and read-only afterwards.
#[derive(Default, Clone)]
pub struct Collaborators {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names.values().copied().collect();
        names.sort_unstable();
        f.debug_struct("Collaborators").field("types", &names).finish()
    }
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.insert_arc(Arc::new(value));
    }

    pub fn insert_arc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        let id = TypeId::of::<T>();
        self.entries.insert(id, value);
        self.names.insert(id, type_name::<T>());
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Failure to read something a handler expects from its context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context accessed before injection")]
    Missing,
    #[error("no collaborator of type {0} configured")]
    Collaborator(&'static str),
}

impl From<ContextError> for ApiError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Missing => ApiError::full(e.to_string(), 500, "CONTEXT_MISSING"),
            ContextError::Collaborator(_) => ApiError::internal(e.to_string()),
        }
    }
}

/// Merged per-request context: request and response of this call plus the
/// shared collaborators.
#[derive(Debug)]
pub struct Context {
    request: Arc<RequestHandle>,
    response: Arc<ResponseHandle>,
    shared: Arc<Collaborators>,
}

impl Context {
    pub fn builder() -> ContextBuilder<Missing, Missing> {
        ContextBuilder {
            request: Missing,
            response: Missing,
            shared: Arc::new(Collaborators::default()),
        }
    }

    pub fn request(&self) -> &RequestHandle {
        &self.request
    }

    pub fn response(&self) -> &ResponseHandle {
        &self.response
    }

    pub fn response_arc(&self) -> Arc<ResponseHandle> {
        Arc::clone(&self.response)
    }

    pub fn shared(&self) -> &Collaborators {
        &self.shared
    }

    pub fn collaborator<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.shared.get::<T>()
    }
}

/// Builder for [`Context`]; `Rq`/`Rs` are [`Missing`] until the request and
/// response are supplied.
pub struct ContextBuilder<Rq, Rs> {
    request: Rq,
    response: Rs,
    shared: Arc<Collaborators>,
}

impl<Rq, Rs> ContextBuilder<Rq, Rs> {
    pub fn shared(mut self, shared: Arc<Collaborators>) -> Self {
        self.shared = shared;
        self
    }

    pub fn request(self, request: Arc<RequestHandle>) -> ContextBuilder<Arc<RequestHandle>, Rs> {
        ContextBuilder {
            request,
            response: self.response,
            shared: self.shared,
        }
    }

    pub fn response(
        self,
        response: Arc<ResponseHandle>,
    ) -> ContextBuilder<Rq, Arc<ResponseHandle>> {
        ContextBuilder {
            request: self.request,
            response,
            shared: self.shared,
        }
    }
}

impl ContextBuilder<Arc<RequestHandle>, Arc<ResponseHandle>> {
    pub fn build(self) -> Context {
        Context {
            request: self.request,
            response: self.response,
            shared: self.shared,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[derive(Debug, PartialEq)]
    struct Pool(&'static str);

    #[test]
    fn collaborators_are_type_keyed() {
        let mut c = Collaborators::new();
        assert!(c.is_empty());
        c.insert(Pool("main"));
        c.insert(42u32);
        assert_eq!(c.len(), 2);
        assert_eq!(*c.get::<Pool>().unwrap(), Pool("main"));
        assert_eq!(*c.get::<u32>().unwrap(), 42);
        assert!(c.get::<String>().is_none());

        c.insert(Pool("replica"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get::<Pool>().unwrap().0, "replica");
    }

    #[test]
    fn shared_values_are_not_copied() {
        let mut c = Collaborators::new();
        let pool = Arc::new(Pool("main"));
        c.insert_arc(Arc::clone(&pool));
        assert!(Arc::ptr_eq(&pool, &c.get::<Pool>().unwrap()));
    }

    #[test]
    fn builder_assembles_context() {
        let mut shared = Collaborators::new();
        shared.insert(Pool("main"));

        let ctx = Context::builder()
            .shared(Arc::new(shared))
            .response(Arc::new(ResponseHandle::new()))
            .request(Arc::new(RequestHandle::new(Method::GET, "/?lang=fr")))
            .build();

        assert_eq!(ctx.request().query_param("lang"), Some("fr"));
        assert!(!ctx.response().is_sent());
        assert_eq!(ctx.collaborator::<Pool>().unwrap().0, "main");
        assert!(format!("{:?}", ctx.shared()).contains("Pool"));
    }

    #[test]
    fn context_errors_map_to_server_errors() {
        let missing = ApiError::from(ContextError::Missing);
        assert_eq!(missing.status, 500);
        assert_eq!(missing.code, "CONTEXT_MISSING".into());

        let collab = ApiError::from(ContextError::Collaborator("sqlx::SqlitePool"));
        assert_eq!(collab.code, "INTERNAL".into());
        assert!(collab.message.contains("sqlx::SqlitePool"));
    }
}
