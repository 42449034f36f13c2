//! Planning: initiatives down to tasks, plus the three reports

use super::{created, ApiJson, ApiPath, ApiQuery, ApiResult, AppState};
use crate::models::{
    DocumentInput, Initiative, InitiativeDetail, InitiativeFilter, InitiativeInput,
    InitiativeStatusReport, InitiativeSummary, Milestone, MilestoneInput, Plan, PlanDetail,
    PlanFilter, PlanInput, PlanningDashboard, PlanningDocument, ReportQuery, ResourceAllocation,
    ResourceInput, ResourceUtilizationReport, Risk, RiskInput, Task, TaskFilter, TaskInput,
    TimelineAdherenceReport,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    user: Option<String>,
}

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/planning/dashboard", get(dashboard))
        .route("/initiatives", get(list_initiatives).post(create_initiative))
        .route(
            "/initiatives/{id}",
            get(initiative_detail)
                .put(update_initiative)
                .delete(delete_initiative),
        )
        .route("/initiatives/{id}/risks", post(create_risk))
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/{id}",
            get(plan_detail).put(update_plan).delete(delete_plan),
        )
        .route("/plans/{id}/milestones", post(create_milestone))
        .route("/plans/{id}/tasks", post(create_task))
        .route(
            "/milestones/{id}",
            get(get_milestone).put(update_milestone).delete(delete_milestone),
        )
        .route("/tasks", get(list_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/resources", post(create_resource))
        .route(
            "/resources/{id}",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .route(
            "/risks/{id}",
            get(get_risk).put(update_risk).delete(delete_risk),
        )
        .route("/documents", post(create_document))
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/reports/initiative-status", get(initiative_status_report))
        .route("/reports/resource-utilization", get(resource_utilization_report))
        .route("/reports/timeline-adherence", get(timeline_adherence_report))
}

fn as_of(query: &ReportQuery) -> NaiveDate {
    query.as_of.unwrap_or_else(|| Utc::now().date_naive())
}

async fn dashboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> ApiResult<Json<PlanningDashboard>> {
    Ok(Json(
        state
            .run(move |store| store.planning_dashboard(query.user.as_deref()))
            .await?,
    ))
}

// ---- initiatives ----

async fn list_initiatives(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<InitiativeFilter>,
) -> ApiResult<Json<Vec<InitiativeSummary>>> {
    Ok(Json(state.run(move |store| store.list_initiatives(&filter)).await?))
}

async fn create_initiative(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<InitiativeInput>,
) -> ApiResult<Response> {
    let initiative = state.run(move |store| store.create_initiative(&input)).await?;
    Ok(created(initiative))
}

async fn initiative_detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<InitiativeDetail>> {
    Ok(Json(state.run(move |store| store.initiative_detail(id)).await?))
}

async fn update_initiative(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<InitiativeInput>,
) -> ApiResult<Json<Initiative>> {
    Ok(Json(
        state
            .run(move |store| store.update_initiative(id, &input))
            .await?,
    ))
}

async fn delete_initiative(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_initiative(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- plans ----

async fn list_plans(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<PlanFilter>,
) -> ApiResult<Json<Vec<Plan>>> {
    Ok(Json(state.run(move |store| store.list_plans(&filter)).await?))
}

async fn create_plan(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<PlanInput>,
) -> ApiResult<Response> {
    let plan = state.run(move |store| store.create_plan(&input)).await?;
    Ok(created(plan))
}

async fn plan_detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PlanDetail>> {
    Ok(Json(state.run(move |store| store.plan_detail(id)).await?))
}

async fn update_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<PlanInput>,
) -> ApiResult<Json<Plan>> {
    Ok(Json(state.run(move |store| store.update_plan(id, &input)).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_plan(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- milestones ----

async fn create_milestone(
    State(state): State<AppState>,
    ApiPath(plan_id): ApiPath<i64>,
    ApiJson(input): ApiJson<MilestoneInput>,
) -> ApiResult<Response> {
    let milestone = state
        .run(move |store| store.create_milestone(plan_id, &input))
        .await?;
    Ok(created(milestone))
}

async fn get_milestone(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Milestone>> {
    Ok(Json(state.run(move |store| store.get_milestone(id)).await?))
}

async fn update_milestone(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<MilestoneInput>,
) -> ApiResult<Json<Milestone>> {
    Ok(Json(
        state
            .run(move |store| store.update_milestone(id, &input))
            .await?,
    ))
}

async fn delete_milestone(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_milestone(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- tasks ----

async fn list_tasks(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.run(move |store| store.list_tasks(&filter)).await?))
}

async fn create_task(
    State(state): State<AppState>,
    ApiPath(plan_id): ApiPath<i64>,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<Response> {
    let task = state.run(move |store| store.create_task(plan_id, &input)).await?;
    Ok(created(task))
}

async fn get_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.run(move |store| store.get_task(id)).await?))
}

async fn update_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<TaskInput>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.run(move |store| store.update_task(id, &input)).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_task(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- resources ----

async fn create_resource(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ResourceInput>,
) -> ApiResult<Response> {
    let resource = state.run(move |store| store.create_resource(&input)).await?;
    Ok(created(resource))
}

async fn get_resource(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<ResourceAllocation>> {
    Ok(Json(state.run(move |store| store.get_resource(id)).await?))
}

async fn update_resource(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<ResourceInput>,
) -> ApiResult<Json<ResourceAllocation>> {
    Ok(Json(
        state
            .run(move |store| store.update_resource(id, &input))
            .await?,
    ))
}

async fn delete_resource(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_resource(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- risks ----

async fn create_risk(
    State(state): State<AppState>,
    ApiPath(initiative_id): ApiPath<i64>,
    ApiJson(input): ApiJson<RiskInput>,
) -> ApiResult<Response> {
    let risk = state
        .run(move |store| store.create_risk(initiative_id, &input))
        .await?;
    Ok(created(risk))
}

async fn get_risk(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Risk>> {
    Ok(Json(state.run(move |store| store.get_risk(id)).await?))
}

async fn update_risk(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<RiskInput>,
) -> ApiResult<Json<Risk>> {
    Ok(Json(state.run(move |store| store.update_risk(id, &input)).await?))
}

async fn delete_risk(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_risk(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- documents ----

async fn create_document(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<DocumentInput>,
) -> ApiResult<Response> {
    let document = state.run(move |store| store.create_document(&input)).await?;
    Ok(created(document))
}

async fn get_document(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<PlanningDocument>> {
    Ok(Json(state.run(move |store| store.get_document(id)).await?))
}

async fn delete_document(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.run(move |store| store.delete_document(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- reports ----

async fn initiative_status_report(
    State(state): State<AppState>,
) -> ApiResult<Json<InitiativeStatusReport>> {
    Ok(Json(state.run(|store| store.initiative_status_report()).await?))
}

async fn resource_utilization_report(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<ResourceUtilizationReport>> {
    let as_of = as_of(&query);
    Ok(Json(
        state
            .run(move |store| store.resource_utilization_report(as_of))
            .await?,
    ))
}

async fn timeline_adherence_report(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> ApiResult<Json<TimelineAdherenceReport>> {
    let as_of = as_of(&query);
    Ok(Json(
        state
            .run(move |store| store.timeline_adherence_report(as_of))
            .await?,
    ))
}
