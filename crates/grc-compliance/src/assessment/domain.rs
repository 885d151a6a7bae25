use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::rules::RuleEvaluationResult;

/// Asset families tracked by the register. Rules are authored per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Physical,
    Information,
    Application,
    Software,
    Supplier,
}

impl AssetType {
    pub fn ordered() -> [AssetType; 5] {
        [
            AssetType::Physical,
            AssetType::Information,
            AssetType::Application,
            AssetType::Software,
            AssetType::Supplier,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Physical => "physical",
            AssetType::Information => "information",
            AssetType::Application => "application",
            AssetType::Software => "software",
            AssetType::Supplier => "supplier",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|asset_type| asset_type.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance state shared by rule results, requirement mappings, and asset roll-ups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    NotAssessed,
    Compliant,
    NonCompliant,
    PartiallyCompliant,
    NotApplicable,
    RequiresReview,
}

impl ComplianceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ComplianceStatus::NotAssessed => "not_assessed",
            ComplianceStatus::Compliant => "compliant",
            ComplianceStatus::NonCompliant => "non_compliant",
            ComplianceStatus::PartiallyCompliant => "partially_compliant",
            ComplianceStatus::NotApplicable => "not_applicable",
            ComplianceStatus::RequiresReview => "requires_review",
        }
    }

    /// Statuses that surface as a compliance gap.
    pub fn is_gap(&self) -> bool {
        matches!(
            self,
            ComplianceStatus::NonCompliant | ComplianceStatus::PartiallyCompliant
        )
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How an assessment history row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentType {
    Automatic,
    Manual,
    Scheduled,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an asset inside its asset family.
    AssetId
);
string_id!(
    /// Identifier of a compliance requirement (e.g. a regulatory clause).
    RequirementId
);
string_id!(
    /// Identifier of a compliance framework grouping requirements.
    FrameworkId
);
string_id!(
    /// Identifier of a declarative validation rule.
    RuleId
);
string_id!(
    /// Identifier of an immutable assessment history row.
    AssessmentId
);
string_id!(
    /// Acting user recorded on mappings and history rows.
    UserId
);

/// Dynamically typed attribute value held by an asset record.
///
/// Serialized untagged so asset payloads and rule values read as plain JSON.
/// ISO `YYYY-MM-DD` strings deserialize as [`FieldValue::Date`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
    List(Vec<FieldValue>),
    Record(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(values: Vec<T>) -> Self {
        FieldValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Attribute holding the framework ids an asset declares it must comply with.
pub const COMPLIANCE_FRAMEWORKS_FIELD: &str = "complianceRequirements";

/// Asset snapshot handed over by the asset directory, addressable by field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl AssetRecord {
    pub fn new(asset_type: AssetType, asset_id: AssetId) -> Self {
        Self {
            asset_type,
            asset_id,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Framework ids listed under [`COMPLIANCE_FRAMEWORKS_FIELD`]; non-text entries are skipped.
    pub fn declared_frameworks(&self) -> Vec<FrameworkId> {
        self.fields
            .get(COMPLIANCE_FRAMEWORKS_FIELD)
            .and_then(FieldValue::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(FieldValue::as_text)
                    .map(FrameworkId::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reporting attributes read from conventional field names.
    pub fn profile(&self) -> AssetProfile {
        AssetProfile {
            name: self.text_field(&["name", "assetName"]),
            identifier: self.text_field(&["identifier", "assetIdentifier"]),
            criticality: self.text_field(&["criticality", "criticalityLevel"]),
            business_unit: self.text_field(&["businessUnit"]),
        }
    }

    fn text_field(&self, candidates: &[&str]) -> Option<String> {
        candidates
            .iter()
            .find_map(|name| self.fields.get(*name).and_then(FieldValue::as_text))
            .map(str::to_string)
    }
}

/// Display attributes used when listing assets in compliance reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub criticality: Option<String>,
    pub business_unit: Option<String>,
}

/// Compliance obligation assets are assessed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: RequirementId,
    pub framework_id: FrameworkId,
    pub code: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Current compliance state of one asset against one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRequirementMapping {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub requirement_id: RequirementId,
    pub compliance_status: ComplianceStatus,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub assessed_by_id: Option<UserId>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
    pub notes: Option<String>,
    pub auto_assessed: bool,
}

impl AssetRequirementMapping {
    pub fn key(&self) -> MappingKey {
        MappingKey {
            asset_type: self.asset_type,
            asset_id: self.asset_id.clone(),
            requirement_id: self.requirement_id.clone(),
        }
    }
}

/// Uniqueness key of a mapping row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MappingKey {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub requirement_id: RequirementId,
}

/// Immutable history row written once per assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceAssessment {
    pub id: AssessmentId,
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub requirement_id: RequirementId,
    pub assessment_type: AssessmentType,
    pub previous_status: ComplianceStatus,
    pub new_status: ComplianceStatus,
    pub validation_results: Vec<RuleEvaluationResult>,
    pub assessed_by_id: Option<UserId>,
    pub assessed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_values_deserialize_from_plain_json() {
        let value: FieldValue = serde_json::from_value(json!({
            "encryptionEnabled": true,
            "retentionDays": 90,
            "reviewedOn": "2025-03-01",
            "owner": "security",
            "tags": ["pci", "prod"],
            "decommissioned": null
        }))
        .expect("record deserializes");

        let FieldValue::Record(fields) = value else {
            panic!("expected record");
        };
        assert_eq!(fields["encryptionEnabled"], FieldValue::Bool(true));
        assert_eq!(fields["retentionDays"], FieldValue::Number(90.0));
        assert_eq!(
            fields["reviewedOn"],
            FieldValue::Date(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid"))
        );
        assert_eq!(fields["owner"], FieldValue::text("security"));
        assert_eq!(fields["tags"], FieldValue::from(vec!["pci", "prod"]));
        assert_eq!(fields["decommissioned"], FieldValue::Null);
    }

    #[test]
    fn declared_frameworks_ignore_non_text_entries() {
        let asset = AssetRecord::new(AssetType::Software, AssetId::new("sw-1")).with_field(
            COMPLIANCE_FRAMEWORKS_FIELD,
            FieldValue::List(vec![
                FieldValue::text("iso-27001"),
                FieldValue::Number(3.0),
                FieldValue::text("soc2"),
            ]),
        );

        assert_eq!(
            asset.declared_frameworks(),
            vec![FrameworkId::new("iso-27001"), FrameworkId::new("soc2")]
        );
    }

    #[test]
    fn asset_type_parses_case_insensitively() {
        assert_eq!(AssetType::parse(" Supplier "), Some(AssetType::Supplier));
        assert_eq!(AssetType::parse("vehicle"), None);
    }
}
