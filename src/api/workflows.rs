//! Workflow metadata, designer graph, version history and ordered steps

use super::{created, ActorQuery, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::designer::{SaveGraphRequest, SaveOutcome};
use crate::models::{
    DesignerData, MoveRequest, VersionSelector, VersionView, Workflow, WorkflowDetail,
    WorkflowFilter, WorkflowInput, WorkflowStep, WorkflowStepInput, WorkflowVersion,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/workflows", get(list).post(create))
        .route("/workflows/{id}", get(detail).put(update).delete(remove))
        .route("/workflows/{id}/designer", get(designer))
        .route("/workflows/{id}/graph", put(save_graph))
        .route("/workflows/{id}/graph/from-steps", post(graph_from_steps))
        .route("/workflows/{id}/versions", get(versions))
        .route("/workflows/{id}/versions/{version}", get(load_version))
        .route(
            "/workflows/{id}/versions/{version}/restore",
            post(restore_version),
        )
        .route("/workflows/{id}/steps", get(list_steps).post(add_step))
        .route(
            "/workflows/{id}/steps/{step_id}",
            get(get_step).put(update_step).delete(delete_step),
        )
        .route("/workflows/{id}/steps/{step_id}/move", post(move_step))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<WorkflowFilter>,
) -> ApiResult<Json<Vec<Workflow>>> {
    Ok(Json(state.run(move |store| store.list_workflows(&filter)).await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<WorkflowInput>,
) -> ApiResult<Response> {
    let workflow = state.run(move |store| store.create_workflow(&input)).await?;
    Ok(created(workflow))
}

async fn detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<WorkflowDetail>> {
    Ok(Json(state.run(move |store| store.workflow_detail(id)).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<WorkflowInput>,
) -> ApiResult<Json<Workflow>> {
    Ok(Json(state.run(move |store| store.update_workflow(id, &input)).await?))
}

async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_workflow(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn designer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DesignerData>> {
    Ok(Json(state.run(move |store| store.designer_data(id)).await?))
}

async fn save_graph(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<SaveGraphRequest>,
) -> ApiResult<Json<SaveOutcome>> {
    let outcome = state
        .run(move |store| store.save_graph(id, &request.graph, request.saved_by.as_deref()))
        .await?;
    Ok(Json(outcome))
}

async fn graph_from_steps(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(actor): ApiQuery<ActorQuery>,
) -> ApiResult<Json<SaveOutcome>> {
    let outcome = state
        .run(move |store| store.graph_from_steps(id, actor.by.as_deref()))
        .await?;
    Ok(Json(outcome))
}

async fn versions(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<WorkflowVersion>>> {
    Ok(Json(state.run(move |store| store.list_versions(id)).await?))
}

/// `version` is a number or `current`.
async fn load_version(
    State(state): State<AppState>,
    ApiPath((id, version)): ApiPath<(i64, String)>,
) -> ApiResult<Json<VersionView>> {
    let selector: VersionSelector = version.parse()?;
    Ok(Json(state.run(move |store| store.load_version(id, selector)).await?))
}

async fn restore_version(
    State(state): State<AppState>,
    ApiPath((id, version)): ApiPath<(i64, i64)>,
    ApiQuery(actor): ApiQuery<ActorQuery>,
) -> ApiResult<Json<SaveOutcome>> {
    let outcome = state
        .run(move |store| store.restore_version(id, version, actor.by.as_deref()))
        .await?;
    Ok(Json(outcome))
}

async fn list_steps(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<WorkflowStep>>> {
    Ok(Json(state.run(move |store| store.list_steps(id)).await?))
}

async fn add_step(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<WorkflowStepInput>,
) -> ApiResult<Response> {
    let step = state.run(move |store| store.add_step(id, &input)).await?;
    Ok(created(step))
}

async fn get_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<WorkflowStep>> {
    Ok(Json(state.run(move |store| store.get_step(id, step_id)).await?))
}

async fn update_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
    ApiJson(input): ApiJson<WorkflowStepInput>,
) -> ApiResult<Json<WorkflowStep>> {
    Ok(Json(
        state
            .run(move |store| store.update_step(id, step_id, &input))
            .await?,
    ))
}

async fn delete_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_step(id, step_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
    ApiJson(request): ApiJson<MoveRequest>,
) -> ApiResult<Json<Value>> {
    let moved = state
        .run(move |store| store.move_step(id, step_id, request.direction))
        .await?;
    let steps = state.run(move |store| store.list_steps(id)).await?;
    Ok(Json(json!({ "moved": moved, "steps": steps })))
}
