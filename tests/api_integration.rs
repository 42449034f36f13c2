//! End-to-end tests for the JSON API
//!
//! Drives the full router (middleware included) with `oneshot` against an
//! in-memory store.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use itrack::api::{router, AppState, REQUEST_ID_HEADER};
use itrack::metrics::Metrics;
use itrack::store::Store;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    router(AppState::new(
        Store::in_memory().unwrap(),
        Metrics::new().unwrap(),
    ))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_system(app: &Router, name: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/systems",
        Some(json!({"name": name, "category": "core"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_echoes_request_id() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-123");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let generated = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_system_crud_and_errors() {
    let app = app();
    let id = create_system(&app, "Banner 9 Admin").await;

    let (status, body) = send(&app, Method::GET, &format!("/api/systems/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["system"]["name"], "Banner 9 Admin");
    assert_eq!(body["system"]["status"], "active");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/systems/{id}"),
        Some(json!({"status": "review"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "review");
    assert_eq!(body["name"], "Banner 9 Admin");

    let (status, body) = send(&app, Method::GET, "/api/systems?status=review", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/systems",
        Some(json!({"name": "   ", "category": "core"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name is required"));

    let (status, body) = send(&app, Method::GET, "/api/systems/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "system 9999 not found");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/systems/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &format!("/api/systems/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let app = app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/systems")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_bad_path_id_uses_error_body() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/systems/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/systems/1/notes/x",
        Some(json!({"title": "t", "content": "c"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, Method::DELETE, "/api/cards/1.5", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_relationships_drive_impact_analysis() {
    let app = app();
    let banner = create_system(&app, "Banner").await;
    let ods = create_system(&app, "ODS").await;
    let reports = create_system(&app, "Reports").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/systems/{ods}/relationships"),
        Some(json!({"relationships": [
            {"source_system_id": banner, "target_system_id": ods, "relationship_type": "depends_on"},
            {"source_system_id": ods, "target_system_id": reports, "relationship_type": "depends_on"},
            {"source_system_id": ods, "relationship_type": "depends_on"}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (_, dependents) = send(
        &app,
        Method::GET,
        &format!("/api/systems/{banner}/dependents"),
        None,
    )
    .await;
    assert_eq!(dependents[0]["name"], "ODS");

    let (status, report) = send(&app, Method::GET, &format!("/api/systems/{banner}/impact"), None).await;
    assert_eq!(status, StatusCode::OK);
    let affected = report["affected"].as_array().unwrap();
    assert_eq!(affected.len(), 2);
    assert_eq!(affected[0]["name"], "ODS");
    assert_eq!(affected[0]["impact_level"], 1);
    assert_eq!(affected[1]["name"], "Reports");
    assert_eq!(affected[1]["impact_level"], 2);
    assert_eq!(affected[1]["path"].as_array().unwrap().len(), 3);

    let (status, diagram) = send(&app, Method::GET, "/api/diagram/relationships", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diagram["links"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_recovery_step_reordering() {
    let app = app();
    let id = create_system(&app, "Payroll").await;
    for title in ["Restore database", "Restart services", "Notify users"] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/systems/{id}/recovery-steps"),
            Some(json!({"title": title, "estimated_minutes": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, steps) = send(&app, Method::GET, &format!("/api/systems/{id}/recovery-steps"), None).await;
    let last = steps[2]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/systems/{id}/recovery-steps/{last}/move"),
        Some(json!({"direction": "up"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moved"], true);
    assert_eq!(body["steps"][1]["title"], "Notify users");
    assert_eq!(body["steps"][2]["title"], "Restart services");

    let (_, disaster) = send(&app, Method::GET, &format!("/api/systems/{id}/disaster"), None).await;
    assert_eq!(disaster["total_estimated_minutes"], 30);
}

#[tokio::test]
async fn test_workflow_graph_versions() {
    let app = app();
    let (status, workflow) = send(
        &app,
        Method::POST,
        "/api/workflows",
        Some(json!({"name": "Onboarding"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = workflow["id"].as_i64().unwrap();
    assert_eq!(workflow["version"], 1);
    assert_eq!(workflow["graph"]["edges"][0]["id"], "e-start-end");

    let graph = json!({
        "nodes": [
            {"id": "start", "type": "start", "position": {"x": 250, "y": 25}, "data": {"label": "Start"}},
            {"id": "collect", "type": "step", "position": {"x": 250, "y": 125}, "data": {"label": "Collect forms"}},
            {"id": "end", "type": "end", "position": {"x": 250, "y": 225}, "data": {"label": "End"}}
        ],
        "edges": [
            {"id": "e1", "source": "start", "target": "collect"},
            {"id": "e2", "source": "collect", "target": "end"}
        ],
        "saved_by": "alice"
    });

    let (status, outcome) = send(&app, Method::PUT, &format!("/api/workflows/{id}/graph"), Some(graph.clone())).await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["saved"], true);
    assert_eq!(outcome["version"], 2);
    assert_eq!(outcome["diff"]["added_nodes"], json!(["collect"]));

    let (_, unchanged) = send(&app, Method::PUT, &format!("/api/workflows/{id}/graph"), Some(graph)).await;
    assert_eq!(unchanged["saved"], false);
    assert_eq!(unchanged["version"], 2);

    let (_, versions) = send(&app, Method::GET, &format!("/api/workflows/{id}/versions"), None).await;
    assert_eq!(versions.as_array().unwrap().len(), 1);
    assert_eq!(versions[0]["version"], 1);
    assert_eq!(versions[0]["created_by"], "alice");

    let (status, current) = send(&app, Method::GET, &format!("/api/workflows/{id}/versions/current"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["current"], true);
    assert_eq!(current["graph"]["nodes"].as_array().unwrap().len(), 3);

    let (status, restored) = send(
        &app,
        Method::POST,
        &format!("/api/workflows/{id}/versions/1/restore?by=bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["version"], 3);

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/workflows/{id}/graph"),
        Some(json!({
            "nodes": [{"id": "start", "type": "start"}],
            "edges": [{"id": "e1", "source": "start", "target": "missing"}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = send(&app, Method::GET, &format!("/api/workflows/{id}/versions/abc"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_card_checkout_conflict() {
    let app = app();
    let (status, card) = send(
        &app,
        Method::POST,
        "/api/cards",
        Some(json!({"title": "Upgrade Banner", "card_type": "task"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = card["id"].as_i64().unwrap();

    let (status, outcome) = send(
        &app,
        Method::POST,
        &format!("/api/cards/{id}/checkout"),
        Some(json!({"user": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["action"], "checked_out");
    assert_eq!(outcome["card"]["assigned_to"], "alice");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/cards/{id}/checkout"),
        Some(json!({"user": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("alice"));

    let (_, outcome) = send(
        &app,
        Method::POST,
        &format!("/api/cards/{id}/checkout"),
        Some(json!({"user": "alice"})),
    )
    .await;
    assert_eq!(outcome["action"], "checked_in");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cards/position",
        Some(json!({"id": id, "x": 320.5, "y": 80.0})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cards) = send(&app, Method::GET, "/api/cards?search=BANNER&type=task", None).await;
    assert_eq!(cards.as_array().unwrap().len(), 1);
    assert_eq!(cards[0]["position_x"], 320.5);
}

#[tokio::test]
async fn test_planning_flow_and_reports() {
    let app = app();
    let (status, initiative) = send(
        &app,
        Method::POST,
        "/api/initiatives",
        Some(json!({"name": "ERP upgrade", "priority": "high"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{initiative}");
    let initiative_id = initiative["id"].as_i64().unwrap();

    let (status, plan) = send(
        &app,
        Method::POST,
        "/api/plans",
        Some(json!({"initiative_id": initiative_id, "name": "Phase 1"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{plan}");
    let plan_id = plan["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/plans/{plan_id}/tasks"),
        Some(json!({
            "name": "Migrate data",
            "status": "completed",
            "due_date": "2026-03-01",
            "completion_date": "2026-02-20",
            "assigned_to": "dana"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/plans/{plan_id}/tasks"),
        Some(json!({"name": "Cut over", "due_date": "2026-04-01", "assigned_to": "dana"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, dashboard) = send(&app, Method::GET, "/api/planning/dashboard?user=dana", None).await;
    assert_eq!(dashboard["my_tasks"].as_array().unwrap().len(), 2);

    let (status, report) = send(
        &app,
        Method::GET,
        "/api/reports/timeline-adherence?as_of=2026-05-01",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["on_time"], 1);
    assert_eq!(report["overdue"], 1);

    let (_, status_report) = send(&app, Method::GET, "/api/reports/initiative-status", None).await;
    assert_eq!(status_report["initiatives"][0]["completion_percentage"], 50.0);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reports/resource-utilization?as_of=not-a-date",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_import_endpoint() {
    let app = app();
    let yaml = "Banner:\n  type: core\n  group: Core Systems\n  inputs: []\nODS:\n  type: core\n  inputs: [Banner]\n";
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/catalog/import")
                .header(header::CONTENT_TYPE, "application/yaml")
                .body(Body::from(yaml))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let summary: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(summary["systems_created"], 2);
    assert_eq!(summary["relationships_created"], 1);

    let (_, stats) = send(&app, Method::GET, "/api/dashboard", None).await;
    assert_eq!(stats["system_count"], 2);
    assert_eq!(stats["active_systems"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = app();
    create_system(&app, "Banner").await;
    send(&app, Method::GET, "/api/systems/1", None).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"itrack_records{kind="systems"} 1"#));
    assert!(text.contains(r#"route="/api/systems/{id}""#));
}
