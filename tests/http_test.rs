mod support;

use dbserver::http::{handle_request, AppState};
use dbserver::{AppConfig, ConnectionRegistry, ConnectionSettings, SqlValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use support::memory_settings;

async fn sqlite_state() -> AppState {
    let registry = ConnectionRegistry::new();
    registry.register("local", memory_settings(1, 1)).await;
    registry.reconcile().await;

    registry
        .exec(
            "local",
            "create table test (id integer primary key, name text)",
            vec![],
        )
        .await
        .unwrap();
    registry
        .exec(
            "local",
            "insert into test(id,name) values (?,?)",
            vec![SqlValue::from(5), SqlValue::Null],
        )
        .await
        .unwrap();

    AppState::new(registry, AppConfig::default())
}

async fn call(state: &AppState, method: Method, uri: &str) -> Response<Body> {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    handle_request(state, req).await
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_serverinfo_under_version_prefix() {
    let state = sqlite_state().await;

    for uri in ["/serverinfo", "/v1.0/serverinfo"] {
        let response = call(&state, Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
        let body = body_string(response).await;
        assert!(body.starts_with("DBName\tDriver\t"));
        assert!(body.contains("local\tsqlite\t1\t1\t1\t"));
    }
}

#[tokio::test]
async fn test_testquery_returns_rows_as_json() {
    let state = sqlite_state().await;

    let response = call(
        &state,
        Method::GET,
        "/testquery?db=local&sql=select%20*%20from%20test%20where%20id%3D5",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["count"], 1);
    assert_eq!(json["rows"][0]["id"], 5);
    assert!(json["rows"][0]["name"].is_null());
}

#[tokio::test]
async fn test_testquery_unknown_db_is_not_found() {
    let state = sqlite_state().await;

    let response = call(&state, Method::GET, "/testquery").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["code"], "E_DB_NOT_FOUND");
    assert_eq!(json["error"], "db(mysql1) not found");
    assert!(!response_has_retry_after(&state, "/testquery").await);
}

async fn response_has_retry_after(state: &AppState, uri: &str) -> bool {
    call(state, Method::GET, uri)
        .await
        .headers()
        .contains_key("retry-after")
}

#[tokio::test]
async fn test_testquery_disconnected_db_asks_to_retry() {
    let state = sqlite_state().await;
    state
        .registry
        .register("down", ConnectionSettings::new("driverX", "bad-dsn", 1, 1))
        .await;
    state.registry.reconcile().await;

    let response = call(&state, Method::GET, "/testquery?db=down").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.headers()["retry-after"], "5");

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["code"], "E_DB_NOT_CONNECTED");

    // Statement errors are final
    let response = call(&state, Method::GET, "/testquery?db=local&sql=select%20*%20from%20missing").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!response.headers().contains_key("retry-after"));
}

#[tokio::test]
async fn test_testexec_inserts_fixed_row() {
    let state = sqlite_state().await;

    let response = call(&state, Method::GET, "/testexec?db=local").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "lastid:3, affectrow:1");

    // Same primary key again fails
    let response = call(&state, Method::GET, "/testexec?db=local").await;
    let body = body_string(response).await;
    assert!(body.starts_with("lastid:-1, affectrow:-1, error:"));
}

#[tokio::test]
async fn test_testexec_unknown_db_reports_error() {
    let state = sqlite_state().await;

    let response = call(&state, Method::GET, "/testexec").await;
    assert_eq!(
        body_string(response).await,
        "lastid:-1, affectrow:-1, error:db(mysql1) not found"
    );
}

#[tokio::test]
async fn test_serverconfig_is_json() {
    let state = sqlite_state().await;

    let response = call(&state, Method::GET, "/serverconfig").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["server"]["port"], 8888);
}

#[tokio::test]
async fn test_options_wrong_method_and_unknown_path() {
    let state = sqlite_state().await;

    let response = call(&state, Method::OPTIONS, "/anything").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-methods"));

    let response = call(&state, Method::POST, "/serverinfo").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = call(&state, Method::GET, "/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
