//! JSON HTTP API
//!
//! Every route lives under `/api`, apart from `/health` and `/metrics`.
//! Handlers hand the blocking SQLite work to `spawn_blocking` through
//! [`AppState::run`] and map [`TrackerError`] onto status codes in
//! [`ApiError`].
//!
//! Each request gets a `request_id` (taken from an incoming `x-request-id`
//! header or freshly generated) that is recorded on its tracing span and
//! echoed back in the response.

mod boards;
mod dashboard;
mod planning;
mod scripts;
mod systems;
mod workflows;

use crate::error::TrackerError;
use crate::metrics::{Metrics, CONTENT_TYPE};
use crate::store::Store;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, MatchedPath, Request, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info_span, warn};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Store, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    /// Run a store call on the blocking pool.
    pub(crate) async fn run<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Store) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| ApiError(TrackerError::Other(format!("store task failed: {e}"))))?
            .map_err(ApiError)
    }
}

/// A [`TrackerError`] rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(pub TrackerError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        if self.0.is_constraint_violation() {
            return StatusCode::CONFLICT;
        }
        match &self.0 {
            TrackerError::NotFound { .. } => StatusCode::NOT_FOUND,
            TrackerError::Validation(_)
            | TrackerError::InvalidGraph(_)
            | TrackerError::Json(_)
            | TrackerError::YamlParse(_)
            | TrackerError::CatalogSizeExceeded(_) => StatusCode::BAD_REQUEST,
            TrackerError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// `Json` whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError(TrackerError::Validation(rejection.body_text())))?;
        Ok(ApiJson(value))
    }
}

/// `Query` whose rejections use the API error body.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Query(value) =
            axum::extract::Query::<T>::from_request_parts(parts, state)
                .await
                .map_err(|rejection: QueryRejection| {
                    ApiError(TrackerError::Validation(rejection.body_text()))
                })?;
        Ok(ApiQuery(value))
    }
}

/// `Path` whose rejections use the API error body.
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(value) =
            axum::extract::Path::<T>::from_request_parts(parts, state)
                .await
                .map_err(|rejection: PathRejection| {
                    ApiError(TrackerError::Validation(rejection.body_text()))
                })?;
        Ok(ApiPath(value))
    }
}

/// `?by=<name>` on actions that record who performed them
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ActorQuery {
    pub by: Option<String>,
}

/// Request id carried in the request extensions
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(systems::routes())
        .merge(scripts::routes())
        .merge(workflows::routes())
        .merge(boards::routes())
        .merge(planning::routes())
        .merge(dashboard::routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(assign_request_id))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let request_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.0.as_str())
                        .unwrap_or("-");
                    info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                    )
                })),
        )
        .with_state(state)
}

async fn assign_request_id(mut req: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let id = req
        .headers()
        .get(&header_name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(header_name, value);
    }
    response
}

async fn track_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(req).await;
    state.metrics.record_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let counts = state.run(|store| store.record_counts()).await?;
    state.metrics.set_record_counts(&counts);
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError(TrackerError::Other(format!("metrics encoding failed: {e}"))))?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response())
}

/// `201 Created` with a JSON body
pub(crate) fn created<T: serde::Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError(TrackerError::not_found("system", 1)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(TrackerError::Validation("name is required".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(TrackerError::InvalidGraph("dangling edge".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(TrackerError::Conflict("checked out".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(TrackerError::LockPoisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_constraint_violation_is_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: TrackerError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(ApiError(err).status(), StatusCode::CONFLICT);
    }
}
