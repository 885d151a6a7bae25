//! Declarative validation rules and the interpreter that applies them to asset records.

mod criteria;
mod model;
mod operators;
mod resolver;
mod status;

pub use criteria::{criterion_matches, evaluate_all};
pub use model::{
    Criterion, NewValidationRule, Operator, ValidationLogic, ValidationRule, ValidationRuleUpdate,
};
pub use operators::evaluate_operator;
pub use resolver::resolve_field;
pub use status::{resolve_asset_overall_status, resolve_requirement_status, StatusCounts};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{AssetRecord, ComplianceStatus, RuleId};

const CONDITIONS_NOT_MET: &str = "Rule conditions not met";
const COMPLIANCE_MET: &str = "All compliance criteria met";
const NON_COMPLIANCE_MATCHED: &str = "Non-compliance criteria matched";
const PARTIAL_COMPLIANCE_MATCHED: &str = "Partial compliance criteria matched";
const MANUAL_REVIEW_REQUIRED: &str = "Unable to determine compliance automatically";

/// Criteria group that decided a rule result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaGroup {
    Conditions,
    ComplianceCriteria,
    NonComplianceCriteria,
    PartialComplianceCriteria,
}

/// Criteria that decided the outcome, kept for auditors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResultDetails {
    pub matched_group: CriteriaGroup,
    pub criteria: Vec<Criterion>,
}

/// Outcome of applying one rule to one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluationResult {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub applicable: bool,
    pub status: ComplianceStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<RuleResultDetails>,
}

/// Runs the four criteria groups of `rule` in order; the first decisive group wins.
///
/// Missing groups never raise: empty conditions always apply, empty compliance
/// criteria are vacuously met, and empty non-compliance or partial groups are
/// skipped.
pub fn evaluate_rule(rule: &ValidationRule, asset: &AssetRecord) -> RuleEvaluationResult {
    let logic = &rule.validation_logic;

    let (applicable, status, message, details) = if !evaluate_all(&logic.conditions, asset) {
        (
            false,
            ComplianceStatus::NotApplicable,
            CONDITIONS_NOT_MET,
            None,
        )
    } else if evaluate_all(&logic.compliance_criteria, asset) {
        (
            true,
            ComplianceStatus::Compliant,
            COMPLIANCE_MET,
            matched(CriteriaGroup::ComplianceCriteria, &logic.compliance_criteria),
        )
    } else if decisive(&logic.non_compliance_criteria, asset) {
        (
            true,
            ComplianceStatus::NonCompliant,
            NON_COMPLIANCE_MATCHED,
            matched(
                CriteriaGroup::NonComplianceCriteria,
                &logic.non_compliance_criteria,
            ),
        )
    } else if decisive(&logic.partial_compliance_criteria, asset) {
        (
            true,
            ComplianceStatus::PartiallyCompliant,
            PARTIAL_COMPLIANCE_MATCHED,
            matched(
                CriteriaGroup::PartialComplianceCriteria,
                &logic.partial_compliance_criteria,
            ),
        )
    } else {
        (
            true,
            ComplianceStatus::RequiresReview,
            MANUAL_REVIEW_REQUIRED,
            None,
        )
    };

    debug!(
        rule_id = %rule.id,
        asset_id = %asset.asset_id,
        status = %status,
        applicable,
        "validation rule evaluated"
    );

    RuleEvaluationResult {
        rule_id: rule.id.clone(),
        rule_name: rule.rule_name.clone(),
        applicable,
        status,
        message: message.to_string(),
        details,
    }
}

fn decisive(criteria: &[Criterion], asset: &AssetRecord) -> bool {
    !criteria.is_empty() && evaluate_all(criteria, asset)
}

fn matched(group: CriteriaGroup, criteria: &[Criterion]) -> Option<RuleResultDetails> {
    if criteria.is_empty() {
        return None;
    }
    Some(RuleResultDetails {
        matched_group: group,
        criteria: criteria.to_vec(),
    })
}
