//! Landing-page statistics, visualisation feeds and catalog import

use super::{ApiResult, AppState};
use crate::catalog::{parse_catalog_yaml, ImportSummary};
use crate::store::{DashboardStats, HostScriptData, SystemScriptGraph, TimelineData};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(stats))
        .route("/visualizations/system-scripts", get(system_scripts))
        .route("/visualizations/host-scripts", get(host_scripts))
        .route("/visualizations/timeline", get(timeline))
        .route("/catalog/import", post(import_catalog))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.run(|store| store.dashboard_stats()).await?))
}

async fn system_scripts(State(state): State<AppState>) -> ApiResult<Json<SystemScriptGraph>> {
    Ok(Json(state.run(|store| store.system_script_graph()).await?))
}

async fn host_scripts(State(state): State<AppState>) -> ApiResult<Json<HostScriptData>> {
    Ok(Json(state.run(|store| store.host_script_data()).await?))
}

async fn timeline(State(state): State<AppState>) -> ApiResult<Json<TimelineData>> {
    Ok(Json(state.run(|store| store.timeline_data()).await?))
}

/// Body is the YAML catalog itself.
async fn import_catalog(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<Json<ImportSummary>> {
    let catalog = parse_catalog_yaml(&body)?;
    Ok(Json(state.run(move |store| store.import_catalog(&catalog)).await?))
}
