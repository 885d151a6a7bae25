use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::assessment::domain::{AssetId, AssetType};
use crate::assessment::memory::InMemoryAssetDirectory;
use crate::assessment::repository::ComplianceRepository;
use crate::assessment::router::status_handler;
use crate::assessment::{compliance_router, ComplianceApi, ACTING_USER_HEADER};
use crate::config::ReportingConfig;

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn assess_requirement_route_records_acting_user() {
    let (api, store) = build_api(vec![failing_server("srv-1")]);
    let app = compliance_router(api);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/compliance/assets/physical/srv-1/requirements/req-encryption/assess")
        .header(ACTING_USER_HEADER, "auditor-7")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["complianceStatus"], "non_compliant");
    assert_eq!(body["previousStatus"], "not_assessed");
    assert_eq!(body["ruleResults"][0]["ruleId"], "encryption-at-rest");
    assert_eq!(
        body["recommendations"][0],
        "Fix issue identified by rule: encryption at rest - Non-compliance criteria matched"
    );

    let history = store
        .assessments(
            crate::assessment::AssetType::Physical,
            &crate::assessment::AssetId::new("srv-1"),
            &crate::assessment::RequirementId::new(ENCRYPTION_REQUIREMENT),
        )
        .expect("history available");
    assert_eq!(
        history[0].assessed_by_id.as_ref().map(|user| user.as_str()),
        Some("auditor-7")
    );
}

#[tokio::test]
async fn unknown_asset_returns_not_found() {
    let app = router_for(Vec::new());

    let response = app
        .oneshot(post_json(
            "/api/v1/compliance/assets/physical/ghost/assess",
            json!({}),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "physical asset ghost not found");
}

#[tokio::test]
async fn unknown_asset_type_is_a_bad_request() {
    let app = router_for(Vec::new());

    let response = app
        .oneshot(get("/api/v1/compliance/assets/vehicle/truck-1/status"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "unknown asset type 'vehicle'");
}

#[tokio::test]
async fn assess_then_read_status_and_gaps() {
    let app = router_for(vec![failing_server("srv-2")]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/compliance/assets/physical/srv-2/assess",
            json!({}),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let outcomes = read_json_body(response).await;
    assert_eq!(outcomes.as_array().map(Vec::len), Some(2));

    let response = app
        .clone()
        .oneshot(get("/api/v1/compliance/assets/physical/srv-2/status"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let status = read_json_body(response).await;
    assert_eq!(status["totalRequirements"], 2);
    assert_eq!(status["overallCompliancePercentage"], 0);
    assert_eq!(status["counts"]["nonCompliant"], 1);
    assert_eq!(status["counts"]["partiallyCompliant"], 1);

    let response = app
        .oneshot(get("/api/v1/compliance/assets/physical/srv-2/gaps"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let gaps = read_json_body(response).await;
    assert_eq!(gaps.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn manual_route_rejects_not_assessed() {
    let app = router_for(vec![compliant_server("srv-3")]);

    let response = app
        .oneshot(post_json(
            "/api/v1/compliance/assets/physical/srv-3/requirements/req-encryption/manual",
            json!({ "status": "not_assessed" }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn manual_route_then_history() {
    let app = router_for(vec![compliant_server("srv-4")]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/compliance/assets/physical/srv-4/requirements/req-backup/manual",
            json!({
                "status": "requires_review",
                "notes": "Backup vendor contract under renegotiation",
                "evidenceUrls": ["https://evidence.example/contract"]
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(
            "/api/v1/compliance/assets/physical/srv-4/requirements/req-backup/history",
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let history = read_json_body(response).await;
    assert_eq!(history[0]["assessmentType"], "manual");
    assert_eq!(history[0]["newStatus"], "requires_review");
    assert_eq!(
        history[0]["notes"],
        "Backup vendor contract under renegotiation"
    );
}

#[tokio::test]
async fn bulk_route_reports_per_asset_failures() {
    let app = router_for(vec![compliant_server("a1"), compliant_server("a3")]);

    let response = app
        .oneshot(post_json(
            "/api/v1/compliance/bulk-assess",
            json!({ "assetType": "physical", "assetIds": ["a1", "a2", "a3"] }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json_body(response).await;
    assert_eq!(report["totalAssessed"], 3);
    assert_eq!(report["successful"], 2);
    assert_eq!(report["failed"], 1);
    assert_eq!(
        report["errors"][0],
        "Failed to assess asset a2: physical asset a2 not found"
    );
}

#[tokio::test]
async fn report_route_accepts_query_filters() {
    let app = router_for(vec![compliant_server("srv-5"), failing_server("srv-6")]);
    for asset in ["srv-5", "srv-6"] {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/compliance/assets/physical/{asset}/assess"),
                json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get(
            "/api/v1/compliance/assets?assetType=physical&complianceStatus=compliant&pageSize=5",
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json_body(response).await;
    assert_eq!(report["pagination"]["pageSize"], 5);
    assert_eq!(report["pagination"]["total"], 1);
    assert_eq!(report["assets"][0]["assetId"], "srv-5");
    assert_eq!(report["summary"]["averageCompliancePercentage"], 100);
}

#[tokio::test]
async fn report_paging_is_clamped_and_malformed_queries_get_json_errors() {
    let (api, _) = build_api(vec![compliant_server("srv-6")]);
    api.service
        .assess_asset(AssetType::Physical, &AssetId::new("srv-6"), None)
        .expect("assessment succeeds");
    let app = compliance_router(api);

    let response = app
        .clone()
        .oneshot(get("/api/v1/compliance/assets?page=-1&pageSize=500"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json_body(response).await;
    assert_eq!(report["pagination"]["page"], 1);
    assert_eq!(report["pagination"]["pageSize"], 100);
    assert_eq!(report["pagination"]["total"], 1);

    let response = app
        .oneshot(get("/api/v1/compliance/assets?page=first"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn rule_routes_cover_the_lifecycle() {
    let app = router_for(Vec::new());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/compliance/rules",
            json!({
                "requirementId": BACKUP_REQUIREMENT,
                "assetType": "software",
                "ruleName": "Vendor support active",
                "validationLogic": {
                    "complianceCriteria": [
                        { "field": "support.endOfLife", "operator": "greater_than", "value": "2026-01-01" }
                    ]
                },
                "priority": 2
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["isActive"], true);
    let rule_id = created["id"].as_str().expect("rule id").to_string();

    let response = app
        .clone()
        .oneshot(get("/api/v1/compliance/rules?assetType=software"))
        .await
        .expect("response");
    let listed = read_json_body(response).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/v1/compliance/rules/{rule_id}"))
                .header("content-type", "application/json")
                .body(Body::from(json!({ "isActive": false }).to_string()))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = read_json_body(response).await;
    assert_eq!(updated["isActive"], false);
    assert_eq!(updated["priority"], 2);

    let delete = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/v1/compliance/rules/{rule_id}"))
            .body(Body::empty())
            .expect("request")
    };
    let response = app.clone().oneshot(delete()).await.expect("response");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(delete()).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get(&format!("/api/v1/compliance/rules/{rule_id}")))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rule_for_unknown_requirement_is_not_found() {
    let app = router_for(Vec::new());

    let response = app
        .oneshot(post_json(
            "/api/v1/compliance/rules",
            json!({
                "requirementId": "req-missing",
                "assetType": "physical",
                "ruleName": "Orphan"
            }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn status_handler_returns_unavailable_when_store_is_down() {
    let api = Arc::new(ComplianceApi::new(
        Arc::new(InMemoryAssetDirectory::default()),
        Arc::new(UnavailableStore),
        ReportingConfig::default(),
    ));

    let response = status_handler::<InMemoryAssetDirectory, UnavailableStore>(
        State(api),
        Path(("physical".to_string(), "srv-1".to_string())),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "repository unavailable: database offline");
}
