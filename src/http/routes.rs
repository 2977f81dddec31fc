//! Request routing and handlers
//!
//! Every route is reachable both bare (`/serverinfo`) and under a version
//! prefix (`/v1.0/serverinfo`). All responses carry permissive CORS headers.

use crate::config::AppConfig;
use crate::database::types::{record_to_json, DatabaseBackend, SqlValue};
use crate::database::{ConnectionRegistry, DEFAULT_CHECK_INTERVAL};
use crate::error::Error;
use hyper::header::{self, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Database used by the diagnostic endpoints when `db` is not given
pub const DEFAULT_TEST_DB: &str = "mysql1";

/// Statement run by `/testquery` when `sql` is not given
pub const DEFAULT_TEST_QUERY: &str = "select * from test where id=5";

/// The fixed `/testexec` insert, written with the placeholders of `backend`
fn test_exec_statement(backend: Option<DatabaseBackend>) -> String {
    let backend = backend.unwrap_or(DatabaseBackend::MySQL);
    format!(
        "insert into test(id,name) values ({},{})",
        backend.parameter_placeholder(1),
        backend.parameter_placeholder(2)
    )
}

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(registry: ConnectionRegistry, config: AppConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    ServerInfo,
    ServerConfig,
    TestQuery,
    TestExec,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/serverinfo" => Some(Route::ServerInfo),
            "/serverconfig" => Some(Route::ServerConfig),
            "/testquery" => Some(Route::TestQuery),
            "/testexec" => Some(Route::TestExec),
            _ => None,
        }
    }
}

/// Strip a `/v{version}` prefix and any trailing slash
fn normalize_path(path: &str) -> &str {
    let mut path = path;

    if let Some(rest) = path.strip_prefix("/v") {
        if let Some(slash) = rest.find('/') {
            let version = &rest[..slash];
            if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit() || c == '.') {
                path = &rest[slash..];
            }
        }
    }

    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Decode the query string into a map; the last occurrence of a key wins
fn query_params(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

/// Route one request
pub async fn handle_request(state: &AppState, req: Request<Body>) -> Response<Body> {
    log::debug!("{} {}", req.method(), req.uri());

    if req.method() == Method::OPTIONS {
        return with_cors(text_response(StatusCode::OK, String::new()));
    }

    let route = match Route::from_path(normalize_path(req.uri().path())) {
        Some(route) => route,
        None => return with_cors(text_response(StatusCode::NOT_FOUND, "Not Found".into())),
    };

    if req.method() != Method::GET {
        return with_cors(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Invalid Method".into(),
        ));
    }

    let params = query_params(req.uri().query());

    let response = match route {
        Route::ServerInfo => server_info(state).await,
        Route::ServerConfig => server_config(state),
        Route::TestQuery => test_query(state, &params).await,
        Route::TestExec => test_exec(state, &params).await,
    };

    with_cors(response)
}

async fn server_info(state: &AppState) -> Response<Body> {
    log::info!("receive get server info request");
    text_response(StatusCode::OK, state.registry.render_status().await)
}

fn server_config(state: &AppState) -> Response<Body> {
    match state.config.to_json_masked() {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => error_response(state, &e),
    }
}

async fn test_query(state: &AppState, params: &HashMap<String, String>) -> Response<Body> {
    let db = params.get("db").map_or(DEFAULT_TEST_DB, String::as_str);
    let sql = params.get("sql").map_or(DEFAULT_TEST_QUERY, String::as_str);

    match state.registry.query_buffered(db, sql).await {
        Ok(records) => {
            let rows: Vec<_> = records.iter().map(record_to_json).collect();
            let body = json!({ "count": rows.len(), "rows": rows });
            json_response(StatusCode::OK, body.to_string())
        }
        Err(e) => {
            log::warn!("testquery on db({}) failed: {}", db, e);
            error_response(state, &e)
        }
    }
}

async fn test_exec(state: &AppState, params: &HashMap<String, String>) -> Response<Body> {
    let db = params.get("db").map_or(DEFAULT_TEST_DB, String::as_str);
    let args = vec![SqlValue::from(3), SqlValue::from("123")];

    let result = match state.registry.handle(db).await {
        Ok(handle) => {
            let statement = test_exec_statement(handle.backend());
            state.registry.exec(db, &statement, args).await
        }
        Err(e) => Err(e),
    };

    let body = match result {
        Ok(result) => format!(
            "lastid:{}, affectrow:{}",
            result.last_insert_id.unwrap_or(-1),
            result.rows_affected
        ),
        Err(e) => format!("lastid:-1, affectrow:-1, error:{}", e),
    };

    text_response(StatusCode::OK, body)
}

fn text_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// JSON error body; errors the reconcile loop may clear carry `Retry-After`
fn error_response(state: &AppState, error: &Error) -> Response<Body> {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({ "error": error.to_string(), "code": error.error_code() });
    let mut response = json_response(status, body.to_string());

    if error.is_retryable() {
        let interval = state
            .config
            .dbserver
            .check_interval()
            .unwrap_or(DEFAULT_CHECK_INTERVAL);
        let seconds = interval.as_secs().max(1);
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }

    response
}

fn with_cors(mut response: Response<Body>) -> Response<Body> {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Origin, X-Requested-With, Content-Type, Accept"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, PUT, OPTIONS"),
    );
    response
}
