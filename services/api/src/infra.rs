use chrono::NaiveDate;
use grc_compliance::assessment::{
    AssetId, AssetRecord, AssetType, ComplianceApi, Criterion, FieldValue, FrameworkId,
    InMemoryAssetDirectory, InMemoryComplianceStore, NewValidationRule, Operator, Requirement,
    RequirementId, ValidationLogic, COMPLIANCE_FRAMEWORKS_FIELD,
};
use grc_compliance::config::ReportingConfig;
use grc_compliance::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type SeededApi = ComplianceApi<InMemoryAssetDirectory, InMemoryComplianceStore>;

pub(crate) const ISO_27001: &str = "iso-27001";
pub(crate) const SOC2: &str = "soc2";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory engine preloaded with the sample register, requirements, and rules.
pub(crate) fn seeded_api(reporting: ReportingConfig) -> Result<Arc<SeededApi>, AppError> {
    let directory = Arc::new(InMemoryAssetDirectory::with_assets(seed_assets()));
    let store = Arc::new(InMemoryComplianceStore::with_requirements(
        seed_requirements(),
    ));
    let api = ComplianceApi::new(directory, store, reporting);

    for rule in seed_rules() {
        api.service.create_rule(rule)?;
    }

    Ok(Arc::new(api))
}

pub(crate) fn seed_requirements() -> Vec<Requirement> {
    [
        (
            "iso-a.5.9",
            ISO_27001,
            "A.5.9",
            "Inventory of information and other associated assets",
        ),
        ("iso-a.8.8", ISO_27001, "A.8.8", "Management of technical vulnerabilities"),
        ("iso-a.8.13", ISO_27001, "A.8.13", "Information backup"),
        ("iso-a.8.24", ISO_27001, "A.8.24", "Use of cryptography"),
        ("soc2-cc9.2", SOC2, "CC9.2", "Vendor and business partner risk management"),
    ]
    .into_iter()
    .map(|(id, framework, code, title)| Requirement {
        id: RequirementId::new(id),
        framework_id: FrameworkId::new(framework),
        code: code.to_string(),
        title: title.to_string(),
        description: None,
    })
    .collect()
}

fn check(field: &str, operator: Operator, value: impl Into<FieldValue>) -> Criterion {
    Criterion::new(field, operator, value)
}

fn new_rule(
    requirement: &str,
    asset_type: AssetType,
    name: &str,
    priority: i32,
    validation_logic: ValidationLogic,
) -> NewValidationRule {
    NewValidationRule {
        requirement_id: RequirementId::new(requirement),
        asset_type,
        rule_name: name.to_string(),
        rule_description: None,
        validation_logic,
        priority,
        is_active: true,
    }
}

pub(crate) fn seed_rules() -> Vec<NewValidationRule> {
    vec![
        new_rule(
            "iso-a.8.24",
            AssetType::Physical,
            "Encryption at rest on high-value hardware",
            10,
            ValidationLogic {
                conditions: vec![check(
                    "criticalityLevel",
                    Operator::In,
                    vec!["high", "critical"],
                )],
                compliance_criteria: vec![check("encryptionEnabled", Operator::Equals, true)],
                non_compliance_criteria: vec![check(
                    "encryptionEnabled",
                    Operator::Equals,
                    false,
                )],
                partial_compliance_criteria: Vec::new(),
            },
        ),
        new_rule(
            "iso-a.8.13",
            AssetType::Physical,
            "Weekly backups",
            5,
            ValidationLogic {
                conditions: Vec::new(),
                compliance_criteria: vec![
                    check("backup.enabled", Operator::Equals, true),
                    check("backup.frequencyDays", Operator::LessThan, 8_i64),
                ],
                non_compliance_criteria: vec![check(
                    "backup.enabled",
                    Operator::NotExists,
                    FieldValue::Null,
                )],
                partial_compliance_criteria: vec![check("backup.enabled", Operator::Equals, true)],
            },
        ),
        new_rule(
            "iso-a.8.24",
            AssetType::Information,
            "Sensitive datasets encrypted",
            10,
            ValidationLogic {
                conditions: vec![check(
                    "classification",
                    Operator::In,
                    vec!["confidential", "restricted"],
                )],
                compliance_criteria: vec![check("encryption.atRest", Operator::Equals, true)],
                non_compliance_criteria: vec![check(
                    "encryption.atRest",
                    Operator::NotEquals,
                    true,
                )],
                partial_compliance_criteria: Vec::new(),
            },
        ),
        new_rule(
            "iso-a.5.9",
            AssetType::Application,
            "Application has an accountable owner",
            3,
            ValidationLogic {
                conditions: Vec::new(),
                compliance_criteria: vec![check("owner", Operator::Exists, FieldValue::Null)],
                non_compliance_criteria: vec![check("owner", Operator::NotExists, FieldValue::Null)],
                partial_compliance_criteria: Vec::new(),
            },
        ),
        new_rule(
            "iso-a.8.8",
            AssetType::Software,
            "Patches applied within 30 days",
            8,
            ValidationLogic {
                conditions: vec![check("supported", Operator::Equals, true)],
                compliance_criteria: vec![check("patchAgeDays", Operator::LessThan, 31_i64)],
                non_compliance_criteria: vec![check(
                    "patchAgeDays",
                    Operator::GreaterThan,
                    90_i64,
                )],
                partial_compliance_criteria: vec![check(
                    "patchAgeDays",
                    Operator::Exists,
                    FieldValue::Null,
                )],
            },
        ),
        new_rule(
            "soc2-cc9.2",
            AssetType::Supplier,
            "Vendor assurance reviewed this year",
            6,
            ValidationLogic {
                conditions: vec![check("dataAccess", Operator::Equals, true)],
                compliance_criteria: vec![
                    check("certifications", Operator::Contains, "SOC 2 Type II"),
                    check("lastReviewedOn", Operator::GreaterThan, date(2025, 1, 1)),
                ],
                non_compliance_criteria: vec![check(
                    "certifications",
                    Operator::NotExists,
                    FieldValue::Null,
                )],
                partial_compliance_criteria: vec![check(
                    "certifications",
                    Operator::Contains,
                    "SOC 2 Type II",
                )],
            },
        ),
    ]
}

pub(crate) fn seed_assets() -> Vec<AssetRecord> {
    vec![
        AssetRecord::new(AssetType::Physical, AssetId::new("srv-001"))
            .with_field("name", "Core ledger server")
            .with_field("identifier", "HW-0001")
            .with_field("criticalityLevel", "critical")
            .with_field("businessUnit", "Finance")
            .with_field("encryptionEnabled", true)
            .with_field(
                "backup",
                record([
                    ("enabled", FieldValue::Bool(true)),
                    ("frequencyDays", FieldValue::Number(1.0)),
                ]),
            )
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001]),
        AssetRecord::new(AssetType::Physical, AssetId::new("srv-002"))
            .with_field("name", "Payments gateway")
            .with_field("identifier", "HW-0002")
            .with_field("criticalityLevel", "critical")
            .with_field("businessUnit", "Finance")
            .with_field("encryptionEnabled", false)
            .with_field(
                "backup",
                record([
                    ("enabled", FieldValue::Bool(true)),
                    ("frequencyDays", FieldValue::Number(14.0)),
                ]),
            )
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001]),
        AssetRecord::new(AssetType::Information, AssetId::new("ds-001"))
            .with_field("name", "Customer records")
            .with_field("identifier", "DATA-0001")
            .with_field("criticality", "high")
            .with_field("businessUnit", "Operations")
            .with_field("classification", "restricted")
            .with_field("encryption", record([("atRest", FieldValue::Bool(true))]))
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001]),
        AssetRecord::new(AssetType::Application, AssetId::new("app-001"))
            .with_field("name", "Payroll portal")
            .with_field("identifier", "APP-0001")
            .with_field("criticality", "medium")
            .with_field("businessUnit", "People")
            .with_field("owner", "people-ops")
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001]),
        AssetRecord::new(AssetType::Software, AssetId::new("sw-001"))
            .with_field("name", "Edge proxy")
            .with_field("identifier", "SW-0001")
            .with_field("criticality", "high")
            .with_field("businessUnit", "Engineering")
            .with_field("supported", true)
            .with_field("patchAgeDays", 60_i64)
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![ISO_27001]),
        AssetRecord::new(AssetType::Supplier, AssetId::new("sup-001"))
            .with_field("assetName", "Acme Hosting")
            .with_field("assetIdentifier", "SUP-0042")
            .with_field("criticalityLevel", "high")
            .with_field("businessUnit", "Procurement")
            .with_field("dataAccess", true)
            .with_field("certifications", vec!["SOC 2 Type II", "ISO 27001"])
            .with_field("lastReviewedOn", date(2024, 6, 30))
            .with_field(COMPLIANCE_FRAMEWORKS_FIELD, vec![SOC2]),
    ]
}

fn record<const N: usize>(entries: [(&str, FieldValue); N]) -> FieldValue {
    FieldValue::Record(
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn date(year: i32, month: u32, day: u32) -> FieldValue {
    NaiveDate::from_ymd_opt(year, month, day)
        .map(FieldValue::Date)
        .unwrap_or_default()
}

pub(crate) fn parse_asset_type(raw: &str) -> Result<AssetType, String> {
    AssetType::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = AssetType::ordered().iter().map(AssetType::as_str).collect();
        format!("unknown asset type '{raw}' (expected one of {})", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grc_compliance::assessment::{AssetDirectory, ComplianceStatus};

    #[test]
    fn seeded_register_covers_every_asset_type() {
        let assets = seed_assets();
        for asset_type in AssetType::ordered() {
            assert!(assets.iter().any(|asset| asset.asset_type == asset_type));
        }
    }

    #[test]
    fn seeded_rules_reference_seeded_requirements() {
        let api = seeded_api(ReportingConfig::default()).expect("seed data is consistent");
        let rules = api
            .service
            .list_rules(&Default::default())
            .expect("rules listed");
        assert_eq!(rules.len(), seed_rules().len());
    }

    #[test]
    fn supplier_profile_uses_asset_prefixed_columns() {
        let directory = InMemoryAssetDirectory::with_assets(seed_assets());
        let profile = directory
            .describe_asset(AssetType::Supplier, &AssetId::new("sup-001"))
            .expect("supplier profile");
        assert_eq!(profile.name.as_deref(), Some("Acme Hosting"));
        assert_eq!(profile.identifier.as_deref(), Some("SUP-0042"));
    }

    #[test]
    fn outdated_vendor_review_is_partial() {
        let api = seeded_api(ReportingConfig::default()).expect("seed data is consistent");
        let outcome = api
            .service
            .assess_asset_requirement(
                AssetType::Supplier,
                &AssetId::new("sup-001"),
                &RequirementId::new("soc2-cc9.2"),
                None,
            )
            .expect("assessment succeeds");
        assert_eq!(outcome.compliance_status, ComplianceStatus::PartiallyCompliant);
    }

    #[test]
    fn asset_type_arguments_are_validated() {
        assert_eq!(parse_asset_type("Software"), Ok(AssetType::Software));
        let error = parse_asset_type("vehicle").expect_err("unknown type");
        assert!(error.contains("physical, information, application, software, supplier"));
    }
}
