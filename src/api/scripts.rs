use super::{created, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::models::{Script, ScriptDetail, ScriptFilter, ScriptInput};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/scripts", get(list).post(create))
        .route("/scripts/{id}", get(detail).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ScriptFilter>,
) -> ApiResult<Json<Vec<Script>>> {
    Ok(Json(state.run(move |store| store.list_scripts(&filter)).await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ScriptInput>,
) -> ApiResult<Response> {
    let script = state.run(move |store| store.create_script(&input)).await?;
    Ok(created(script))
}

async fn detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ScriptDetail>> {
    Ok(Json(state.run(move |store| store.script_detail(id)).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ScriptInput>,
) -> ApiResult<Json<Script>> {
    Ok(Json(state.run(move |store| store.update_script(id, &input)).await?))
}

async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_script(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
