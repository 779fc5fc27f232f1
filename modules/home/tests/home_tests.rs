use actionkit::{ActionRouter, HandlerRegistry, RouterConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::ServiceExt;

// Pulls in the crate so its handlers are submitted to the registry.
use home as _;

fn router() -> ActionRouter {
    ActionRouter::new(RouterConfig {
        base_dir: home::NAMESPACE.into(),
        ..RouterConfig::default()
    })
    .with_registry(HandlerRegistry::discover_and_build().expect("registry"))
}

fn app(router: ActionRouter) -> axum::Router {
    let mut router = router;
    router
        .get("/", "HomeController@index")
        .and_then(|r| r.get("/home", "Home/HomeController@index"))
        .and_then(|r| r.get("/greet", "GreetingController@hello"))
        .expect("routes");
    router.into_axum()
}

async fn pool() -> SqlitePool {
    SqlitePool::connect("sqlite::memory:").await.unwrap()
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn handlers_are_registered_under_namespace() {
    let registry = HandlerRegistry::discover_and_build().unwrap();
    for name in [
        "src/backend/HomeController",
        "src/backend/Home/HomeController",
        "src/backend/GreetingController",
    ] {
        assert!(registry.get(name).is_some(), "{name} missing");
    }
}

#[tokio::test]
async fn home_index_returns_rows() {
    let app = app(router().with_collaborator(pool().await));
    let (status, body) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"rows": [{"val": 1}]}}));
}

#[tokio::test]
async fn namespaced_home_reads_id_from_query() {
    let app = app(router().with_collaborator(pool().await));
    let (status, body) = get(app.clone(), "/home?id=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"id": 7, "rows": [{"val": 7}]}));

    let (status, body) = get(app, "/home?id=seven").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_ID");
}

#[tokio::test]
async fn missing_pool_is_a_server_error() {
    let (status, body) = get(app(router()), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("no collaborator"));
}

#[tokio::test]
async fn closed_pool_is_reported_to_the_caller() {
    let pool = pool().await;
    pool.close().await;
    let (status, body) = get(app(router().with_collaborator(pool)), "/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn greeting_is_localized() {
    let (status, body) = get(app(router()), "/greet?lang=fr").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Bonjour");

    let (_, body) = get(app(router()), "/greet").await;
    assert_eq!(body["data"]["message"], "Hello");
}

#[tokio::test]
async fn greeting_in_unknown_language_fails() {
    let (status, body) = get(app(router()), "/greet?lang=xx").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "LANG_MISSING");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Not found 'xx' in"));
}
