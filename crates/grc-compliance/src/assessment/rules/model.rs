use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{AssetType, FieldValue, RequirementId, RuleId};

/// Comparison applied between a resolved field and the expected value.
///
/// Names outside the supported set are kept as [`Operator::Unknown`] so that a
/// badly authored rule still loads and simply never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    In,
    NotIn,
    Exists,
    NotExists,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Unknown(name) => name,
        }
    }
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.as_str() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            "in" => Operator::In,
            "not_in" => Operator::NotIn,
            "exists" => Operator::Exists,
            "not_exists" => Operator::NotExists,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(field, operator, value)` check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: FieldValue,
}

impl Criterion {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// The four ordered criteria groups of a rule. Missing groups load as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationLogic {
    #[serde(default)]
    pub conditions: Vec<Criterion>,
    #[serde(default)]
    pub compliance_criteria: Vec<Criterion>,
    #[serde(default)]
    pub non_compliance_criteria: Vec<Criterion>,
    #[serde(default)]
    pub partial_compliance_criteria: Vec<Criterion>,
}

/// Declarative check implementing the automatable part of one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub id: RuleId,
    pub requirement_id: RequirementId,
    pub asset_type: AssetType,
    pub rule_name: String,
    pub rule_description: Option<String>,
    pub validation_logic: ValidationLogic,
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Authoring payload for a new rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValidationRule {
    pub requirement_id: RequirementId,
    pub asset_type: AssetType,
    pub rule_name: String,
    #[serde(default)]
    pub rule_description: Option<String>,
    #[serde(default)]
    pub validation_logic: ValidationLogic,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewValidationRule {
    pub fn into_rule(self, id: RuleId, now: DateTime<Utc>) -> ValidationRule {
        ValidationRule {
            id,
            requirement_id: self.requirement_id,
            asset_type: self.asset_type,
            rule_name: self.rule_name,
            rule_description: self.rule_description,
            validation_logic: self.validation_logic,
            priority: self.priority,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRuleUpdate {
    #[serde(default)]
    pub rule_name: Option<String>,
    #[serde(default)]
    pub rule_description: Option<String>,
    #[serde(default)]
    pub validation_logic: Option<ValidationLogic>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ValidationRuleUpdate {
    pub fn apply(self, rule: &mut ValidationRule, now: DateTime<Utc>) {
        if let Some(name) = self.rule_name {
            rule.rule_name = name;
        }
        if let Some(description) = self.rule_description {
            rule.rule_description = Some(description);
        }
        if let Some(logic) = self.validation_logic {
            rule.validation_logic = logic;
        }
        if let Some(priority) = self.priority {
            rule.priority = priority;
        }
        if let Some(active) = self.is_active {
            rule.is_active = active;
        }
        rule.updated_at = now;
    }
}
