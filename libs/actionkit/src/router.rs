//! `Handler@action` routing on top of an [`axum::Router`].
//!
//! Routes are recorded with [`ActionRouter::register`] (or the per-verb
//! shorthands) and turned into axum routes by [`ActionRouter::into_axum`].
//! Every request then goes through the [`Dispatcher`]; failures are handed to
//! the router's [`ErrorChannel`].

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::error::Error as _;
use std::fmt;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{self, MethodFilter, MethodRouter, Route};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower::{Layer, Service};

use crate::action::{display_base_dir, handler_key, ActionParseError, ActionRef};
use crate::base::DefaultLang;
use crate::context::Collaborators;
use crate::dispatcher::Dispatcher;
use crate::envelope;
use crate::error::{ApiError, DispatchError};
use crate::registry::HandlerRegistry;
use crate::request::RequestHandle;
use crate::response::WrittenResponse;

/// Default limit for buffered request bodies.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Namespace every handler name is resolved under.
    pub base_dir: String,
    /// Prepended to every registered path.
    pub prefix: String,
    /// Reject routes to unregistered handlers at registration time.
    pub strict: bool,
    pub default_lang: String,
    pub body_limit_bytes: usize,
    /// Put the failure text of unexpected errors into the 500 envelope.
    pub expose_internal_errors: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_dir: String::new(),
            prefix: String::new(),
            strict: false,
            default_lang: crate::base::DEFAULT_LANG.to_string(),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            expose_internal_errors: false,
        }
    }
}

/// One registered `(verb, path) -> Handler@action` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: Method,
    pub path: String,
    pub action: ActionRef,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid action '{action}'")]
    InvalidAction {
        action: String,
        #[source]
        source: ActionParseError,
    },
    #[error("route {method} {path} is already registered")]
    Duplicate { method: Method, path: String },
    #[error("Not found '{action}' in {handler}")]
    UnknownAction { handler: String, action: String },
    #[error("Not found '{handler}' in {base_dir}")]
    UnknownHandler { handler: String, base_dir: String },
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("route {path} conflicts with {existing}: parameter names differ")]
    ConflictingPath { path: String, existing: String },
}

/// Receives every failed dispatch and turns it into the HTTP response.
pub trait ErrorChannel: Send + Sync + 'static {
    fn forward(&self, err: DispatchError) -> Response;
}

impl<F> ErrorChannel for F
where
    F: Fn(DispatchError) -> Response + Send + Sync + 'static,
{
    fn forward(&self, err: DispatchError) -> Response {
        self(err)
    }
}

/// Renders user-facing errors as-is and everything else as a 500 envelope.
#[derive(Debug, Clone, Default)]
pub struct DefaultErrorChannel {
    pub expose_internal_errors: bool,
}

impl DefaultErrorChannel {
    pub fn to_api_error(&self, err: &DispatchError) -> ApiError {
        if let Some(api) = err.api_error() {
            return api.clone();
        }
        match err {
            DispatchError::MalformedBody(msg) => {
                return ApiError::full(format!("Malformed request body: {msg}"), 400, "MALFORMED_BODY");
            }
            DispatchError::PayloadTooLarge { .. } => {
                return ApiError::full(err.to_string(), 413, "PAYLOAD_TOO_LARGE");
            }
            _ => {}
        }
        if self.expose_internal_errors {
            ApiError::internal(err_chain(err))
        } else {
            ApiError::internal("Internal Server Error")
        }
    }
}

fn err_chain(err: &DispatchError) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cur = e.source();
    }
    out
}

impl ErrorChannel for DefaultErrorChannel {
    fn forward(&self, err: DispatchError) -> Response {
        let api = self.to_api_error(&err);
        if api.status_code().is_server_error() {
            tracing::error!(error = %err_chain(&err), "request failed");
        } else {
            tracing::debug!(error = %err, status = api.status, "request rejected");
        }
        envelope::error_response(&api)
    }
}

type PendingLayer = Box<dyn FnOnce(axum::Router) -> axum::Router + Send>;

/// Maps `Handler@action` strings onto the transport router.
pub struct ActionRouter {
    config: RouterConfig,
    transport: axum::Router,
    registry: HandlerRegistry,
    shared: Arc<Collaborators>,
    channel: Arc<dyn ErrorChannel>,
    routes: Vec<RouteEntry>,
    // Index-aligned with `routes`.
    filters: Vec<MethodFilter>,
    seen: HashSet<(Method, String)>,
    // Parameter-agnostic shape -> first path registered with it.
    shapes: HashMap<String, String>,
    layers: Vec<PendingLayer>,
}

impl fmt::Debug for ActionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRouter")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("shared", &self.shared)
            .field("routes", &self.routes)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl ActionRouter {
    pub fn new(config: RouterConfig) -> Self {
        let mut shared = Collaborators::new();
        shared.insert(DefaultLang(config.default_lang.clone()));
        let channel = DefaultErrorChannel {
            expose_internal_errors: config.expose_internal_errors,
        };
        Self {
            config,
            transport: axum::Router::new(),
            registry: HandlerRegistry::default(),
            shared: Arc::new(shared),
            channel: Arc::new(channel),
            routes: Vec::new(),
            filters: Vec::new(),
            seen: HashSet::new(),
            shapes: HashMap::new(),
            layers: Vec::new(),
        }
    }

    /// Use an existing router (with its own routes/state) as the transport.
    pub fn with_transport(mut self, transport: axum::Router) -> Self {
        self.transport = transport;
        self
    }

    /// Set the handler registry. Set it before registering routes so that
    /// action names can be validated eagerly.
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Add a process-wide collaborator, visible to handlers through their context.
    pub fn with_collaborator<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        Arc::make_mut(&mut self.shared).insert(value);
        self
    }

    pub fn with_shared_collaborator<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        Arc::make_mut(&mut self.shared).insert_arc(value);
        self
    }

    pub fn with_error_channel(mut self, channel: impl ErrorChannel) -> Self {
        self.channel = Arc::new(channel);
        self
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        action: &str,
    ) -> Result<&mut Self, RouteError> {
        let Some(filter) = method_filter(&method) else {
            return Err(RouteError::UnsupportedMethod(method));
        };
        let action = ActionRef::parse(action).map_err(|source| RouteError::InvalidAction {
            action: action.to_string(),
            source,
        })?;
        let path = self.full_path(path)?;

        let key = handler_key(&self.config.base_dir, action.handler());
        match self.registry.get(&key) {
            Some(entry) if !entry.has_action(action.action()) => {
                return Err(RouteError::UnknownAction {
                    handler: key,
                    action: action.action().to_string(),
                });
            }
            Some(_) => {}
            None if self.config.strict => {
                return Err(RouteError::UnknownHandler {
                    handler: action.handler().to_string(),
                    base_dir: display_base_dir(&self.config.base_dir),
                });
            }
            None => {
                tracing::debug!(handler = %key, "handler not registered yet; resolving per request");
            }
        }

        let shape = path_shape(&path);
        if let Some(existing) = self.shapes.get(&shape) {
            if *existing != path {
                return Err(RouteError::ConflictingPath {
                    path,
                    existing: existing.clone(),
                });
            }
        }
        if !self.seen.insert((method.clone(), path.clone())) {
            return Err(RouteError::Duplicate { method, path });
        }
        self.shapes.entry(shape).or_insert_with(|| path.clone());
        tracing::debug!(%method, %path, action = %action, "route registered");
        self.routes.push(RouteEntry {
            method,
            path,
            action,
        });
        self.filters.push(filter);
        Ok(self)
    }

    pub fn get(&mut self, path: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.register(Method::GET, path, action)
    }

    pub fn post(&mut self, path: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.register(Method::POST, path, action)
    }

    pub fn put(&mut self, path: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.register(Method::PUT, path, action)
    }

    pub fn patch(&mut self, path: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.register(Method::PATCH, path, action)
    }

    pub fn delete(&mut self, path: &str, action: &str) -> Result<&mut Self, RouteError> {
        self.register(Method::DELETE, path, action)
    }

    /// Attach middleware around every route; applied in call order when the
    /// router is finalized, so the last layer added is the outermost.
    pub fn use_layer<L>(&mut self, layer: L) -> &mut Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layers.push(Box::new(move |router| router.layer(layer)));
        self
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.registry.clone(),
            Arc::clone(&self.shared),
            self.config.base_dir.clone(),
        )
    }

    /// Dispatch without an error channel: the failure is returned to the caller.
    ///
    /// Routes are matched on method and literal path; `{param}` segments are
    /// not expanded here.
    pub async fn dispatch(&self, request: RequestHandle) -> Result<WrittenResponse, DispatchError> {
        let route = self
            .routes
            .iter()
            .find(|r| r.method == *request.method() && r.path == request.path())
            .ok_or_else(|| DispatchError::RouteNotFound {
                method: request.method().clone(),
                path: request.path().to_string(),
            })?;
        self.dispatcher().dispatch(route, request).await
    }

    /// Finalize: add one axum route per registration, then the layers.
    pub fn into_axum(self) -> axum::Router {
        let dispatcher = Arc::new(self.dispatcher());
        let channel = self.channel;
        let body_limit = self.config.body_limit_bytes;

        let mut router = self.transport;
        for (route, filter) in self.routes.into_iter().zip(self.filters) {
            let path = route.path.clone();
            let method_router = route_for(
                filter,
                Arc::new(route),
                Arc::clone(&dispatcher),
                Arc::clone(&channel),
                body_limit,
            );
            router = router.route(&path, method_router);
        }
        for apply in self.layers {
            router = apply(router);
        }
        router
    }

    fn full_path(&self, path: &str) -> Result<String, RouteError> {
        if !path.starts_with('/') {
            return Err(invalid_path(path, "must start with '/'"));
        }
        let prefix = self.config.prefix.trim_end_matches('/');
        let full = if prefix.is_empty() {
            path.to_string()
        } else if !prefix.starts_with('/') {
            return Err(invalid_path(&self.config.prefix, "prefix must start with '/'"));
        } else if path == "/" {
            prefix.to_string()
        } else {
            format!("{prefix}{path}")
        };
        check_segments(&full)?;
        Ok(full)
    }
}

fn invalid_path(path: &str, reason: &'static str) -> RouteError {
    RouteError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

/// Parameters are whole `{name}` segments; a `{*name}` catch-all only comes last.
fn check_segments(path: &str) -> Result<(), RouteError> {
    let segments: Vec<&str> = path.split('/').skip(1).collect();
    for (i, seg) in segments.iter().enumerate() {
        if seg.starts_with(':') || seg.starts_with('*') {
            return Err(invalid_path(path, "use `{name}` for parameters"));
        }
        if !seg.contains(['{', '}']) {
            continue;
        }
        let name = seg
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| invalid_path(path, "a parameter must fill its whole segment"))?;
        let (catch_all, name) = match name.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        if name.is_empty() || name.contains(['{', '}', '*']) {
            return Err(invalid_path(path, "malformed parameter name"));
        }
        if catch_all && i + 1 != segments.len() {
            return Err(invalid_path(path, "a catch-all must be the last segment"));
        }
    }
    Ok(())
}

/// `/users/{id}` and `/users/{name}` share the shape `/users/{}`.
fn path_shape(path: &str) -> String {
    path.split('/')
        .map(|seg| {
            if seg.starts_with("{*") {
                "{*}"
            } else if seg.starts_with('{') {
                "{}"
            } else {
                seg
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    match *method {
        Method::GET => Some(MethodFilter::GET),
        Method::POST => Some(MethodFilter::POST),
        Method::PUT => Some(MethodFilter::PUT),
        Method::PATCH => Some(MethodFilter::PATCH),
        Method::DELETE => Some(MethodFilter::DELETE),
        _ => None,
    }
}

fn route_for(
    filter: MethodFilter,
    route: Arc<RouteEntry>,
    dispatcher: Arc<Dispatcher>,
    channel: Arc<dyn ErrorChannel>,
    body_limit: usize,
) -> MethodRouter {
    let handler = move |req: Request| {
        let route = Arc::clone(&route);
        let dispatcher = Arc::clone(&dispatcher);
        let channel = Arc::clone(&channel);
        async move {
            let outcome = match RequestHandle::from_axum(req, body_limit).await {
                Ok(request) => dispatcher.dispatch(&route, request).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(written) => written.into_response(),
                Err(err) => channel.forward(err),
            }
        }
    };

    routing::on(filter, handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Base;
    use crate::contracts::{Controller, Initializable, Injectable};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Pages {
        base: Base,
    }

    impl Injectable for Pages {
        fn base(&self) -> &Base {
            &self.base
        }
        fn base_mut(&mut self) -> &mut Base {
            &mut self.base
        }
    }

    impl Initializable for Pages {}

    #[async_trait]
    impl Controller for Pages {
        const ACTIONS: &'static [&'static str] = &["index", "show"];

        async fn invoke(&mut self, _action: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registry() -> HandlerRegistry {
        let mut b = HandlerRegistry::builder();
        b.register_controller::<Pages>("backend/Pages");
        b.build().unwrap()
    }

    fn config() -> RouterConfig {
        RouterConfig {
            base_dir: "backend".into(),
            ..RouterConfig::default()
        }
    }

    #[test]
    fn config_defaults_and_unknown_fields() {
        let cfg: RouterConfig = serde_json::from_str(r#"{"base_dir":"src"}"#).unwrap();
        assert_eq!(cfg.base_dir, "src");
        assert_eq!(cfg.default_lang, "en");
        assert_eq!(cfg.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);
        assert!(serde_json::from_str::<RouterConfig>(r#"{"nope":1}"#).is_err());
    }

    #[test]
    fn invalid_action_strings_are_rejected() {
        let mut r = ActionRouter::new(config());
        for bad in ["Pages", "@index", "Pages@", "Pages@a@b"] {
            match r.get("/", bad) {
                Err(RouteError::InvalidAction { action, .. }) => assert_eq!(action, bad),
                other => panic!("unexpected result for {bad}: {other:?}"),
            }
        }
        assert!(r.routes().is_empty());
    }

    #[test]
    fn known_handler_actions_are_checked_eagerly() {
        let mut r = ActionRouter::new(config()).with_registry(registry());
        r.get("/", "Pages@index").unwrap().get("/show", "Pages@show").unwrap();
        match r.get("/edit", "Pages@edit") {
            Err(RouteError::UnknownAction { handler, action }) => {
                assert_eq!(handler, "backend/Pages");
                assert_eq!(action, "edit");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(r.routes().len(), 2);
    }

    #[test]
    fn unknown_handlers_are_lazy_unless_strict() {
        let mut lazy = ActionRouter::new(config()).with_registry(registry());
        assert!(lazy.get("/ghost", "Ghost@index").is_ok());

        let mut strict = ActionRouter::new(RouterConfig {
            strict: true,
            ..config()
        })
        .with_registry(registry());
        let err = strict.get("/ghost", "Ghost@index").unwrap_err();
        assert_eq!(err.to_string(), "Not found 'Ghost' in backend");
    }

    #[test]
    fn duplicate_routes_are_rejected_per_method() {
        let mut r = ActionRouter::new(config());
        r.get("/", "Pages@index").unwrap();
        r.post("/", "Pages@index").unwrap();
        assert!(matches!(
            r.get("/", "Pages@show"),
            Err(RouteError::Duplicate { .. })
        ));
    }

    #[test]
    fn prefix_is_prepended() {
        let mut r = ActionRouter::new(RouterConfig {
            prefix: "/api/".into(),
            ..config()
        });
        r.get("/", "Pages@index").unwrap();
        r.get("/show", "Pages@show").unwrap();
        let paths: Vec<_> = r.routes().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["/api", "/api/show"]);
    }

    #[test]
    fn bad_paths_and_methods() {
        let mut r = ActionRouter::new(config());
        assert!(matches!(r.get("show", "Pages@show"), Err(RouteError::InvalidPath { .. })));
        assert!(matches!(
            r.register(Method::OPTIONS, "/", "Pages@index"),
            Err(RouteError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn colon_and_star_segments_are_rejected() {
        let mut r = ActionRouter::new(config());
        for bad in ["/users/:id", "/files/*rest", "/users/{id", "/users/x{id}", "/a/{*rest}/b", "/a/{}"] {
            assert!(
                matches!(r.get(bad, "Pages@show"), Err(RouteError::InvalidPath { .. })),
                "{bad} accepted"
            );
        }
        r.get("/users/{id}", "Pages@show").unwrap();
        r.get("/files/{*rest}", "Pages@show").unwrap();
        assert_eq!(r.routes().len(), 2);
        let _ = r.into_axum();
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let mut r = ActionRouter::new(RouterConfig {
            prefix: "/v1/:tenant".into(),
            ..config()
        });
        assert!(matches!(r.get("/", "Pages@index"), Err(RouteError::InvalidPath { .. })));
    }

    #[test]
    fn parameter_names_must_agree_across_methods() {
        let mut r = ActionRouter::new(config());
        r.get("/users/{id}", "Pages@show").unwrap();
        r.put("/users/{id}", "Pages@show").unwrap();
        let err = r.post("/users/{name}", "Pages@show").unwrap_err();
        assert!(matches!(err, RouteError::ConflictingPath { ref existing, .. } if existing == "/users/{id}"));
        assert_eq!(r.routes().len(), 2);

        r.get("/users/{id}/posts", "Pages@index").unwrap();
        let _ = r.into_axum();
    }

    #[test]
    fn default_channel_hides_internal_details() {
        let channel = DefaultErrorChannel::default();
        let err = DispatchError::Init {
            handler: "Pages".into(),
            source: anyhow::anyhow!("pool closed"),
        };
        let api = channel.to_api_error(&err);
        assert_eq!(api.status, 500);
        assert_eq!(api.message, "Internal Server Error");

        let verbose = DefaultErrorChannel {
            expose_internal_errors: true,
        };
        assert!(verbose.to_api_error(&err).message.contains("pool closed"));
    }

    #[test]
    fn oversized_bodies_map_to_413() {
        let api = DefaultErrorChannel::default()
            .to_api_error(&DispatchError::PayloadTooLarge { limit: 16 });
        assert_eq!(api.status, 413);
        assert_eq!(api.code, crate::error::ErrorCode::from("PAYLOAD_TOO_LARGE"));
    }

    #[test]
    fn default_channel_keeps_api_errors() {
        let err = DispatchError::Action {
            handler: "Pages".into(),
            action: "index".into(),
            source: ApiError::full("Bad lang", 422, "LANG_MISSING").into(),
        };
        let api = DefaultErrorChannel::default().to_api_error(&err);
        assert_eq!(api, ApiError::full("Bad lang", 422, "LANG_MISSING"));
    }
}
