//! Assembles the HTTP application from the loaded configuration.

use std::time::Duration;

use actionkit::{ActionRouter, HandlerRegistry};
use actionkit_bootstrap::{AppConfig, DatabaseConfig, RouteConfig};
use anyhow::{Context as _, Result};
use axum::http::{HeaderName, Method};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn connect_pool(db: &DatabaseConfig) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.dsn)
        .await
        .with_context(|| format!("failed to connect to {}", db.dsn))?;
    tracing::info!(dsn = %db.dsn, max_connections = db.max_connections, "database pool ready");
    Ok(pool)
}

fn parse_method(route: &RouteConfig) -> Result<Method> {
    Method::from_bytes(route.method.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{}'", route.method))
}

/// Register every configured route. Fails on the first bad entry.
pub fn action_router(config: &AppConfig, pool: Option<SqlitePool>) -> Result<ActionRouter> {
    let registry = HandlerRegistry::discover_and_build()?;
    tracing::info!(handlers = registry.len(), "handler registry built");

    let mut router = ActionRouter::new(config.router.clone()).with_registry(registry);
    if let Some(pool) = pool {
        router = router.with_collaborator(pool);
    }

    for route in &config.routes {
        let method = parse_method(route)?;
        router
            .register(method, &route.path, &route.action)
            .with_context(|| format!("route {} {} -> {}", route.method, route.path, route.action))?;
    }
    Ok(router)
}

/// Final axum application: action routes wrapped in the HTTP middleware stack.
pub fn build_app(config: &AppConfig, pool: Option<SqlitePool>) -> Result<axum::Router> {
    let body_limit = config.router.body_limit_bytes;
    let mut app = action_router(config, pool)?.into_axum();

    if config.server.timeout_sec > 0 {
        app = app.layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout_sec)));
    }
    app = app.layer(RequestBodyLimitLayer::new(body_limit));

    // Outermost to innermost: request id (set, propagate) -> trace -> limits -> routes
    let x_request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let app = app
        .layer(TraceLayer::new_for_http().make_span_with(|req: &axum::extract::Request| {
            let rid = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("n/a");
            tracing::info_span!(
                "http_request",
                method = %req.method(),
                uri = %req.uri().path(),
                request_id = %rid,
            )
        }))
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));
    Ok(app)
}
