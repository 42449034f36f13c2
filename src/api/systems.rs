//! Systems, their relationships, notes and recovery runbooks

use super::{created, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::impact::ImpactReport;
use crate::models::{
    DisasterAnalysis, MoveRequest, NoteInput, RecoveryStep, RecoveryStepInput, RelationshipBatch,
    RelationshipDiagram, System, SystemDetail, SystemFilter, SystemInput, SystemNote, SystemPatch,
    SystemRef, SystemRelationship,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/systems", get(list).post(create))
        .route(
            "/systems/{id}",
            get(detail).put(update).patch(patch).delete(remove),
        )
        .route("/systems/{id}/dependencies", get(dependencies))
        .route("/systems/{id}/dependents", get(dependents))
        .route(
            "/systems/{id}/relationships",
            get(relationships).put(save_relationships),
        )
        .route("/systems/{id}/impact", get(impact))
        .route("/systems/{id}/disaster", get(disaster))
        .route("/systems/{id}/notes", get(list_notes).post(add_note))
        .route(
            "/systems/{id}/notes/{note_id}",
            put(update_note).delete(delete_note),
        )
        .route(
            "/systems/{id}/recovery-steps",
            get(list_steps).post(create_step),
        )
        .route(
            "/systems/{id}/recovery-steps/{step_id}",
            get(get_step).put(update_step).delete(delete_step),
        )
        .route("/systems/{id}/recovery-steps/{step_id}/move", post(move_step))
        .route("/diagram/relationships", get(diagram))
}

async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SystemFilter>,
) -> ApiResult<Json<Vec<System>>> {
    Ok(Json(state.run(move |store| store.list_systems(&filter)).await?))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SystemInput>,
) -> ApiResult<Response> {
    let system = state.run(move |store| store.create_system(&input)).await?;
    Ok(created(system))
}

async fn detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<SystemDetail>> {
    Ok(Json(state.run(move |store| store.system_detail(id)).await?))
}

async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<SystemInput>,
) -> ApiResult<Json<System>> {
    Ok(Json(state.run(move |store| store.update_system(id, &input)).await?))
}

async fn patch(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<SystemPatch>,
) -> ApiResult<Json<System>> {
    Ok(Json(state.run(move |store| store.patch_system(id, &input)).await?))
}

async fn remove(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_system(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dependencies(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<SystemRef>>> {
    Ok(Json(state.run(move |store| store.dependencies(id)).await?))
}

async fn dependents(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<SystemRef>>> {
    Ok(Json(state.run(move |store| store.dependents(id)).await?))
}

async fn relationships(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<SystemRelationship>>> {
    Ok(Json(state.run(move |store| store.system_relationships(id)).await?))
}

async fn save_relationships(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(batch): ApiJson<RelationshipBatch>,
) -> ApiResult<Json<Vec<SystemRelationship>>> {
    let saved = state
        .run(move |store| store.save_relationships(id, &batch.relationships))
        .await?;
    Ok(Json(saved))
}

async fn impact(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ImpactReport>> {
    Ok(Json(state.run(move |store| store.impact_analysis(id)).await?))
}

async fn disaster(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<DisasterAnalysis>> {
    Ok(Json(state.run(move |store| store.disaster_analysis(id)).await?))
}

async fn diagram(State(state): State<AppState>) -> ApiResult<Json<RelationshipDiagram>> {
    Ok(Json(state.run(|store| store.relationship_diagram()).await?))
}

async fn list_notes(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<SystemNote>>> {
    Ok(Json(state.run(move |store| store.list_notes(id)).await?))
}

async fn add_note(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<NoteInput>,
) -> ApiResult<Response> {
    let note = state.run(move |store| store.add_note(id, &input)).await?;
    Ok(created(note))
}

async fn update_note(
    State(state): State<AppState>,
    ApiPath((id, note_id)): ApiPath<(i64, i64)>,
    ApiJson(input): ApiJson<NoteInput>,
) -> ApiResult<Json<SystemNote>> {
    Ok(Json(
        state
            .run(move |store| store.update_note(id, note_id, &input))
            .await?,
    ))
}

async fn delete_note(
    State(state): State<AppState>,
    ApiPath((id, note_id)): ApiPath<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_note(id, note_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_steps(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Vec<RecoveryStep>>> {
    Ok(Json(state.run(move |store| store.list_recovery_steps(id)).await?))
}

/// Always appends; an `id` in the body is ignored here.
async fn create_step(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(mut input): ApiJson<RecoveryStepInput>,
) -> ApiResult<Response> {
    input.id = None;
    let step = state
        .run(move |store| store.save_recovery_step(id, &input))
        .await?;
    Ok(created(step))
}

async fn get_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
) -> ApiResult<Json<RecoveryStep>> {
    Ok(Json(
        state
            .run(move |store| store.get_recovery_step(id, step_id))
            .await?,
    ))
}

async fn update_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
    ApiJson(mut input): ApiJson<RecoveryStepInput>,
) -> ApiResult<Json<RecoveryStep>> {
    input.id = Some(step_id);
    Ok(Json(
        state
            .run(move |store| store.save_recovery_step(id, &input))
            .await?,
    ))
}

async fn delete_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
) -> ApiResult<StatusCode> {
    state
        .run(move |store| store.delete_recovery_step(id, step_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_step(
    State(state): State<AppState>,
    ApiPath((id, step_id)): ApiPath<(i64, i64)>,
    ApiJson(request): ApiJson<MoveRequest>,
) -> ApiResult<Json<Value>> {
    let moved = state
        .run(move |store| store.move_recovery_step(id, step_id, request.direction))
        .await?;
    let steps = state.run(move |store| store.list_recovery_steps(id)).await?;
    Ok(Json(json!({ "moved": moved, "steps": steps })))
}
