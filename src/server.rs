//! HTTP front end.
//!
//! ```text
//! ANY /api/<resource>/<action>/<args...>   → Api::handle
//! GET /healthz                             → "ok"
//! ```
//!
//! Request data is the query string, then a form body, then a JSON body,
//! with later sources overriding earlier keys. Who made a change comes from
//! the `X-Author-Name` / `X-Author-Email` headers, falling back to the
//! configured default author. Store calls are blocking filesystem and git
//! work, so each one runs on tokio's blocking pool.

use crate::api::{Api, ApiRequest, ApiResponse, merge_request_data, parse_json_body};
use crate::types::Attribution;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use serde_json::{Map, Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const AUTHOR_NAME: &str = "x-author-name";
const AUTHOR_EMAIL: &str = "x-author-email";

#[derive(Clone)]
struct AppState {
    api: Arc<Api>,
    default_author: Arc<str>,
}

/// The application router with CORS and request tracing.
pub fn router(api: Arc<Api>, default_author: &str) -> Router {
    let state = AppState {
        api,
        default_author: Arc::from(default_author),
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(AUTHOR_NAME),
            HeaderName::from_static(AUTHOR_EMAIL),
        ]);

    Router::new()
        .route("/healthz", get(health))
        .route("/api", any(api_root))
        .route("/api/", any(api_root))
        .route("/api/*path", any(api_call))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(api: Arc<Api>, addr: SocketAddr, default_author: &str) -> std::io::Result<()> {
    let app = router(api, default_author);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> &'static str {
    "ok"
}

async fn api_root(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run(state, String::new(), query, headers, body).await
}

async fn api_call(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    run(state, path, query, headers, body).await
}

async fn run(
    state: AppState,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let data = match request_data(query.as_deref(), &headers, &body) {
        Ok(data) => data,
        Err(response) => return into_http(response),
    };
    let request = ApiRequest {
        path,
        data,
        attribution: attribution(&headers, &state.default_author),
    };

    let api = state.api.clone();
    match tokio::task::spawn_blocking(move || api.handle(&request)).await {
        Ok(response) => into_http(response),
        Err(e) => {
            error!(error = %e, "request handler panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "Internal error", "code": "internal"})),
            )
                .into_response()
        }
    }
}

fn request_data(
    query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Map<String, Value>, ApiResponse> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let query = form_fields(query.unwrap_or("").as_bytes());
    let form = if content_type.starts_with("application/x-www-form-urlencoded") {
        form_fields(body)
    } else {
        Map::new()
    };
    let json = if content_type.starts_with("application/json") {
        parse_json_body(body).map_err(|e| ApiResponse {
            status: e.status(),
            body: json!({"success": false, "error": e.to_string(), "code": e.code()}),
        })?
    } else {
        Map::new()
    };
    Ok(merge_request_data([query, form, json]))
}

/// `a=1&b=x%20y` as string fields; a repeated key keeps its last value.
fn form_fields(raw: &[u8]) -> Map<String, Value> {
    url::form_urlencoded::parse(raw)
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn attribution(headers: &HeaderMap, default_author: &str) -> Attribution {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let who = Attribution::new(header(AUTHOR_NAME).unwrap_or(default_author));
    match header(AUTHOR_EMAIL) {
        Some(email) => who.with_email(email),
        None => who,
    }
}

fn into_http(response: ApiResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}
