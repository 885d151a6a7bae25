use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::assessment::domain::{
    AssetId, AssetProfile, AssetRecord, AssetRequirementMapping, AssetType, ComplianceAssessment,
    FieldValue, FrameworkId, Requirement, RequirementId, RuleId, COMPLIANCE_FRAMEWORKS_FIELD,
};
use crate::assessment::memory::{InMemoryAssetDirectory, InMemoryComplianceStore};
use crate::assessment::repository::{
    AssessmentWrite, AssetDirectory, AssetLookupError, ComplianceRepository, RepositoryError,
    RuleFilter,
};
use crate::assessment::rules::{
    Criterion, Operator, RuleEvaluationResult, ValidationLogic, ValidationRule,
};
use crate::assessment::{compliance_router, ComplianceApi, ComplianceAssessmentService};
use crate::config::ReportingConfig;

pub(super) const ISO_27001: &str = "iso-27001";
pub(super) const ENCRYPTION_REQUIREMENT: &str = "req-encryption";
pub(super) const BACKUP_REQUIREMENT: &str = "req-backup";

pub(super) fn requirement(id: &str, framework: &str, title: &str) -> Requirement {
    Requirement {
        id: RequirementId::new(id),
        framework_id: FrameworkId::new(framework),
        code: id.to_uppercase(),
        title: title.to_string(),
        description: None,
    }
}

pub(super) fn requirements() -> Vec<Requirement> {
    vec![
        requirement(ENCRYPTION_REQUIREMENT, ISO_27001, "Cryptographic controls"),
        requirement(BACKUP_REQUIREMENT, ISO_27001, "Information backup"),
        requirement("req-vendor", "soc2", "Vendor management"),
    ]
}

pub(super) fn criterion(field: &str, operator: Operator, value: impl Into<FieldValue>) -> Criterion {
    Criterion::new(field, operator, value)
}

pub(super) fn rule(
    id: &str,
    requirement_id: &str,
    asset_type: AssetType,
    priority: i32,
    logic: ValidationLogic,
) -> ValidationRule {
    let created = Utc
        .with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    ValidationRule {
        id: RuleId::new(id),
        requirement_id: RequirementId::new(requirement_id),
        asset_type,
        rule_name: id.replace('-', " "),
        rule_description: None,
        validation_logic: logic,
        priority,
        is_active: true,
        created_at: created,
        updated_at: created,
    }
}

/// Critical assets must be encrypted; unencrypted critical assets fail outright.
pub(super) fn encryption_rule() -> ValidationRule {
    rule(
        "encryption-at-rest",
        ENCRYPTION_REQUIREMENT,
        AssetType::Physical,
        10,
        ValidationLogic {
            conditions: vec![criterion("criticalityLevel", Operator::Equals, "critical")],
            compliance_criteria: vec![criterion("encryptionEnabled", Operator::Equals, true)],
            non_compliance_criteria: vec![criterion(
                "encryptionEnabled",
                Operator::Equals,
                false,
            )],
            partial_compliance_criteria: Vec::new(),
        },
    )
}

/// Weekly backups are compliant; any backup at all is partial.
pub(super) fn backup_rule() -> ValidationRule {
    rule(
        "backup-frequency",
        BACKUP_REQUIREMENT,
        AssetType::Physical,
        5,
        ValidationLogic {
            conditions: Vec::new(),
            compliance_criteria: vec![
                criterion("backup.enabled", Operator::Equals, true),
                criterion("backup.frequencyDays", Operator::LessThan, 8_i64),
            ],
            non_compliance_criteria: vec![criterion("backup.enabled", Operator::NotExists, FieldValue::Null)],
            partial_compliance_criteria: vec![criterion("backup.enabled", Operator::Equals, true)],
        },
    )
}

pub(super) fn backup(enabled: bool, frequency_days: i64) -> FieldValue {
    let mut fields = std::collections::BTreeMap::new();
    fields.insert("enabled".to_string(), FieldValue::Bool(enabled));
    fields.insert(
        "frequencyDays".to_string(),
        FieldValue::Number(frequency_days as f64),
    );
    FieldValue::Record(fields)
}

pub(super) fn server(id: &str) -> AssetRecord {
    AssetRecord::new(AssetType::Physical, AssetId::new(id))
        .with_field("name", format!("Server {id}"))
        .with_field("identifier", id.to_uppercase())
        .with_field("criticalityLevel", "critical")
        .with_field("businessUnit", "Finance")
        .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001])
}

pub(super) fn compliant_server(id: &str) -> AssetRecord {
    server(id)
        .with_field("encryptionEnabled", true)
        .with_field("backup", backup(true, 7))
}

pub(super) fn failing_server(id: &str) -> AssetRecord {
    server(id)
        .with_field("encryptionEnabled", false)
        .with_field("backup", backup(true, 30))
}

pub(super) type MemoryService = ComplianceAssessmentService<InMemoryAssetDirectory, InMemoryComplianceStore>;

pub(super) fn build_service(
    assets: Vec<AssetRecord>,
) -> (
    MemoryService,
    Arc<InMemoryAssetDirectory>,
    Arc<InMemoryComplianceStore>,
) {
    let directory = Arc::new(InMemoryAssetDirectory::with_assets(assets));
    let store = Arc::new(InMemoryComplianceStore::with_requirements(requirements()));
    store
        .insert_rule(encryption_rule())
        .expect("encryption rule stored");
    store.insert_rule(backup_rule()).expect("backup rule stored");
    let service = ComplianceAssessmentService::new(directory.clone(), store.clone());
    (service, directory, store)
}

pub(super) fn build_api(
    assets: Vec<AssetRecord>,
) -> (
    Arc<ComplianceApi<InMemoryAssetDirectory, InMemoryComplianceStore>>,
    Arc<InMemoryComplianceStore>,
) {
    let directory = Arc::new(InMemoryAssetDirectory::with_assets(assets));
    let store = Arc::new(InMemoryComplianceStore::with_requirements(requirements()));
    store
        .insert_rule(encryption_rule())
        .expect("encryption rule stored");
    store.insert_rule(backup_rule()).expect("backup rule stored");
    let api = Arc::new(ComplianceApi::new(
        directory,
        store.clone(),
        ReportingConfig::default(),
    ));
    (api, store)
}

pub(super) fn router_for(assets: Vec<AssetRecord>) -> axum::Router {
    let (api, _) = build_api(assets);
    compliance_router(api)
}

pub(super) fn result(status: crate::assessment::ComplianceStatus, applicable: bool) -> RuleEvaluationResult {
    RuleEvaluationResult {
        rule_id: RuleId::new(format!("rule-{}", status.label())),
        rule_name: status.label().to_string(),
        applicable,
        status,
        message: String::new(),
        details: None,
    }
}

/// Directory that fails lookups for selected ids and delegates the rest.
pub(super) struct FlakyDirectory {
    pub(super) inner: InMemoryAssetDirectory,
    pub(super) failing: BTreeSet<AssetId>,
}

impl AssetDirectory for FlakyDirectory {
    fn get_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetRecord, AssetLookupError> {
        if self.failing.contains(asset_id) {
            return Err(AssetLookupError::Unavailable(format!(
                "register timeout for {asset_id}"
            )));
        }
        self.inner.get_asset(asset_type, asset_id)
    }

    fn describe_asset(&self, asset_type: AssetType, asset_id: &AssetId) -> Option<AssetProfile> {
        self.inner.describe_asset(asset_type, asset_id)
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ComplianceRepository for UnavailableStore {
    fn requirement(&self, _id: &RequirementId) -> Result<Option<Requirement>, RepositoryError> {
        offline()
    }

    fn requirements_for_frameworks(
        &self,
        _frameworks: &[FrameworkId],
    ) -> Result<Vec<Requirement>, RepositoryError> {
        offline()
    }

    fn insert_rule(&self, _rule: ValidationRule) -> Result<ValidationRule, RepositoryError> {
        offline()
    }

    fn rule(&self, _id: &RuleId) -> Result<Option<ValidationRule>, RepositoryError> {
        offline()
    }

    fn rules(&self, _filter: &RuleFilter) -> Result<Vec<ValidationRule>, RepositoryError> {
        offline()
    }

    fn update_rule(&self, _rule: ValidationRule) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_rule(&self, _id: &RuleId) -> Result<(), RepositoryError> {
        offline()
    }

    fn active_rules(
        &self,
        _requirement_id: &RequirementId,
        _asset_type: AssetType,
    ) -> Result<Vec<ValidationRule>, RepositoryError> {
        offline()
    }

    fn mapping(
        &self,
        _asset_type: AssetType,
        _asset_id: &AssetId,
        _requirement_id: &RequirementId,
    ) -> Result<Option<AssetRequirementMapping>, RepositoryError> {
        offline()
    }

    fn mappings_for_asset(
        &self,
        _asset_type: AssetType,
        _asset_id: &AssetId,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        offline()
    }

    fn all_mappings(
        &self,
        _asset_type: Option<AssetType>,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        offline()
    }

    fn record_assessment(
        &self,
        _write: AssessmentWrite,
    ) -> Result<ComplianceAssessment, RepositoryError> {
        offline()
    }

    fn assessments(
        &self,
        _asset_type: AssetType,
        _asset_id: &AssetId,
        _requirement_id: &RequirementId,
    ) -> Result<Vec<ComplianceAssessment>, RepositoryError> {
        offline()
    }

    fn latest_assessment(
        &self,
        _asset_type: AssetType,
        _asset_id: &AssetId,
        _requirement_id: &RequirementId,
    ) -> Result<Option<ComplianceAssessment>, RepositoryError> {
        offline()
    }
}

/// Store that stalls reads so overlapping assessments interleave.
pub(super) struct PausingStore {
    pub(super) inner: Arc<InMemoryComplianceStore>,
    pub(super) pause: Duration,
}

impl ComplianceRepository for PausingStore {
    fn requirement(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError> {
        self.inner.requirement(id)
    }

    fn requirements_for_frameworks(
        &self,
        frameworks: &[FrameworkId],
    ) -> Result<Vec<Requirement>, RepositoryError> {
        self.inner.requirements_for_frameworks(frameworks)
    }

    fn insert_rule(&self, rule: ValidationRule) -> Result<ValidationRule, RepositoryError> {
        self.inner.insert_rule(rule)
    }

    fn rule(&self, id: &RuleId) -> Result<Option<ValidationRule>, RepositoryError> {
        self.inner.rule(id)
    }

    fn rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, RepositoryError> {
        self.inner.rules(filter)
    }

    fn update_rule(&self, rule: ValidationRule) -> Result<(), RepositoryError> {
        self.inner.update_rule(rule)
    }

    fn delete_rule(&self, id: &RuleId) -> Result<(), RepositoryError> {
        self.inner.delete_rule(id)
    }

    fn active_rules(
        &self,
        requirement_id: &RequirementId,
        asset_type: AssetType,
    ) -> Result<Vec<ValidationRule>, RepositoryError> {
        thread::sleep(self.pause);
        self.inner.active_rules(requirement_id, asset_type)
    }

    fn mapping(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<AssetRequirementMapping>, RepositoryError> {
        thread::sleep(self.pause);
        self.inner.mapping(asset_type, asset_id, requirement_id)
    }

    fn mappings_for_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        self.inner.mappings_for_asset(asset_type, asset_id)
    }

    fn all_mappings(
        &self,
        asset_type: Option<AssetType>,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        self.inner.all_mappings(asset_type)
    }

    fn record_assessment(
        &self,
        write: AssessmentWrite,
    ) -> Result<ComplianceAssessment, RepositoryError> {
        self.inner.record_assessment(write)
    }

    fn assessments(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Vec<ComplianceAssessment>, RepositoryError> {
        self.inner.assessments(asset_type, asset_id, requirement_id)
    }

    fn latest_assessment(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<ComplianceAssessment>, RepositoryError> {
        self.inner.latest_assessment(asset_type, asset_id, requirement_id)
    }
}

/// Records every asset id handed to the directory, in call order.
#[derive(Default)]
pub(super) struct RecordingDirectory {
    pub(super) inner: InMemoryAssetDirectory,
    pub(super) calls: Mutex<Vec<AssetId>>,
}

impl AssetDirectory for RecordingDirectory {
    fn get_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetRecord, AssetLookupError> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(asset_id.clone());
        self.inner.get_asset(asset_type, asset_id)
    }

    fn describe_asset(&self, asset_type: AssetType, asset_id: &AssetId) -> Option<AssetProfile> {
        self.inner.describe_asset(asset_type, asset_id)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
