use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::aggregator::{AssetComplianceAggregator, AssetComplianceQuery};
use super::domain::{AssetId, AssetType, RequirementId, RuleId, UserId};
use super::repository::{AssetDirectory, ComplianceRepository, RepositoryError, RuleFilter};
use super::rules::{NewValidationRule, ValidationRuleUpdate};
use super::service::{AssessmentError, ComplianceAssessmentService, ManualAssessment};
use crate::config::ReportingConfig;

/// Header carrying the acting user's id.
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// Shared state behind the compliance routes.
pub struct ComplianceApi<A, S> {
    pub service: ComplianceAssessmentService<A, S>,
    pub aggregator: AssetComplianceAggregator<A, S>,
}

impl<A, S> ComplianceApi<A, S>
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    pub fn new(assets: Arc<A>, store: Arc<S>, reporting: ReportingConfig) -> Self {
        Self {
            service: ComplianceAssessmentService::new(assets.clone(), store.clone()),
            aggregator: AssetComplianceAggregator::new(assets, store, reporting),
        }
    }
}

/// Router builder exposing assessment, reporting, and rule authoring endpoints.
pub fn compliance_router<A, S>(api: Arc<ComplianceApi<A, S>>) -> Router
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    Router::new()
        .route("/api/v1/compliance/assets", get(report_handler::<A, S>))
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/assess",
            post(assess_asset_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/status",
            get(status_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/gaps",
            get(gaps_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/requirements/:requirement_id/assess",
            post(assess_requirement_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/requirements/:requirement_id/manual",
            post(manual_assessment_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/assets/:asset_type/:asset_id/requirements/:requirement_id/history",
            get(history_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/bulk-assess",
            post(bulk_assess_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/rules",
            post(create_rule_handler::<A, S>).get(list_rules_handler::<A, S>),
        )
        .route(
            "/api/v1/compliance/rules/:rule_id",
            get(get_rule_handler::<A, S>)
                .put(update_rule_handler::<A, S>)
                .delete(delete_rule_handler::<A, S>),
        )
        .with_state(api)
}

type ApiState<A, S> = State<Arc<ComplianceApi<A, S>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkAssessmentRequest {
    pub(crate) asset_type: AssetType,
    pub(crate) asset_ids: Vec<AssetId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RuleListQuery {
    #[serde(default)]
    pub(crate) requirement_id: Option<RequirementId>,
    #[serde(default)]
    pub(crate) asset_type: Option<AssetType>,
}

pub(crate) async fn assess_requirement_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id, requirement_id)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api.service.assess_asset_requirement(
        asset_type,
        &AssetId(asset_id),
        &RequirementId(requirement_id),
        acting_user(&headers),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn manual_assessment_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id, requirement_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(assessment): Json<ManualAssessment>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api.service.record_manual_assessment(
        asset_type,
        &AssetId(asset_id),
        &RequirementId(requirement_id),
        assessment,
        acting_user(&headers),
    ) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn history_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id, requirement_id)): Path<(String, String, String)>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api.service.assessment_history(
        asset_type,
        &AssetId(asset_id),
        &RequirementId(requirement_id),
    ) {
        Ok(history) => (StatusCode::OK, Json(history)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn assess_asset_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api
        .service
        .assess_asset(asset_type, &AssetId(asset_id), acting_user(&headers))
    {
        Ok(outcomes) => (StatusCode::OK, Json(outcomes)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn status_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id)): Path<(String, String)>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api.service.asset_compliance_status(asset_type, &AssetId(asset_id)) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn gaps_handler<A, S>(
    State(api): ApiState<A, S>,
    Path((asset_type, asset_id)): Path<(String, String)>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let asset_type = match parse_asset_type(&asset_type) {
        Ok(asset_type) => asset_type,
        Err(response) => return response,
    };

    match api.service.compliance_gaps(asset_type, &AssetId(asset_id)) {
        Ok(gaps) => (StatusCode::OK, Json(gaps)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn report_handler<A, S>(
    State(api): ApiState<A, S>,
    query: Result<Query<AssetComplianceQuery>, QueryRejection>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid_query(rejection),
    };
    match api.aggregator.report(&query) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => failure_response(error.into()),
    }
}

pub(crate) async fn bulk_assess_handler<A, S>(
    State(api): ApiState<A, S>,
    headers: HeaderMap,
    Json(request): Json<BulkAssessmentRequest>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let report = api.service.bulk_assess(
        request.asset_type,
        &request.asset_ids,
        acting_user(&headers),
    );
    (StatusCode::OK, Json(report)).into_response()
}

pub(crate) async fn create_rule_handler<A, S>(
    State(api): ApiState<A, S>,
    Json(rule): Json<NewValidationRule>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    match api.service.create_rule(rule) {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn list_rules_handler<A, S>(
    State(api): ApiState<A, S>,
    query: Result<Query<RuleListQuery>, QueryRejection>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return invalid_query(rejection),
    };
    let filter = RuleFilter {
        requirement_id: query.requirement_id,
        asset_type: query.asset_type,
    };
    match api.service.list_rules(&filter) {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn get_rule_handler<A, S>(
    State(api): ApiState<A, S>,
    Path(rule_id): Path<String>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    match api.service.get_rule(&RuleId(rule_id)) {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn update_rule_handler<A, S>(
    State(api): ApiState<A, S>,
    Path(rule_id): Path<String>,
    Json(update): Json<ValidationRuleUpdate>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    match api.service.update_rule(&RuleId(rule_id), update) {
        Ok(rule) => (StatusCode::OK, Json(rule)).into_response(),
        Err(error) => failure_response(error),
    }
}

pub(crate) async fn delete_rule_handler<A, S>(
    State(api): ApiState<A, S>,
    Path(rule_id): Path<String>,
) -> Response
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    match api.service.delete_rule(&RuleId(rule_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => failure_response(error),
    }
}

fn acting_user(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(ACTING_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(UserId::new)
}

fn parse_asset_type(raw: &str) -> Result<AssetType, Response> {
    AssetType::parse(raw).ok_or_else(|| {
        let payload = json!({
            "error": format!("unknown asset type '{raw}'"),
        });
        (StatusCode::BAD_REQUEST, Json(payload)).into_response()
    })
}

fn invalid_query(rejection: QueryRejection) -> Response {
    let payload = json!({ "error": rejection.body_text() });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

pub(crate) fn failure_response(error: AssessmentError) -> Response {
    let status = match &error {
        AssessmentError::AssetNotFound { .. }
        | AssessmentError::RequirementNotFound(_)
        | AssessmentError::RuleNotFound(_)
        | AssessmentError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AssessmentError::InvalidStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AssessmentError::AssetLookup(_)
        | AssessmentError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
