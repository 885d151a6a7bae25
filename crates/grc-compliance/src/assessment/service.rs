use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    AssessmentId, AssessmentType, AssetId, AssetRecord, AssetRequirementMapping, AssetType,
    ComplianceAssessment, ComplianceStatus, Requirement, RequirementId, RuleId, UserId,
};
use super::repository::{
    AssessmentWrite, AssetDirectory, AssetLookupError, ComplianceRepository, RepositoryError,
    RuleFilter,
};
use super::rules::{
    evaluate_rule, resolve_requirement_status, NewValidationRule, RuleEvaluationResult,
    StatusCounts, ValidationRule, ValidationRuleUpdate,
};

static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ASSESSMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

fn next_assessment_id() -> AssessmentId {
    let id = ASSESSMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssessmentId(format!("asmt-{id:06}"))
}

/// Result of assessing one asset against one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementAssessmentOutcome {
    pub assessment_id: AssessmentId,
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub requirement_id: RequirementId,
    pub previous_status: ComplianceStatus,
    pub compliance_status: ComplianceStatus,
    pub rule_results: Vec<RuleEvaluationResult>,
    pub recommendations: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}

/// Current state of one requirement mapping plus the rule detail behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementComplianceView {
    pub requirement_id: RequirementId,
    pub requirement_code: Option<String>,
    pub requirement_title: Option<String>,
    pub compliance_status: ComplianceStatus,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub assessed_by_id: Option<UserId>,
    pub auto_assessed: bool,
    pub last_assessment_id: Option<AssessmentId>,
    pub rule_results: Vec<RuleEvaluationResult>,
}

/// Persisted compliance picture of a single asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetComplianceStatus {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub total_requirements: usize,
    pub counts: StatusCounts,
    pub overall_compliance_percentage: u32,
    pub requirements: Vec<RequirementComplianceView>,
}

/// Requirement an asset currently fails or only partially meets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceGap {
    pub requirement_id: RequirementId,
    pub requirement_code: Option<String>,
    pub requirement_title: Option<String>,
    pub compliance_status: ComplianceStatus,
    pub last_assessed_at: Option<DateTime<Utc>>,
    pub failed_rules: Vec<RuleEvaluationResult>,
    pub recommendations: Vec<String>,
}

/// Aggregate of a bulk run; per-asset failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssessmentReport {
    pub total_assessed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<RequirementAssessmentOutcome>,
    pub errors: Vec<String>,
}

/// Reviewer-supplied outcome for a requirement that rules cannot decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAssessment {
    pub status: ComplianceStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub evidence_urls: Vec<String>,
}

/// Orchestrates asset lookup, rule evaluation, status resolution, and persistence.
pub struct ComplianceAssessmentService<A, S> {
    assets: Arc<A>,
    store: Arc<S>,
}

impl<A, S> ComplianceAssessmentService<A, S>
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    pub fn new(assets: Arc<A>, store: Arc<S>) -> Self {
        Self { assets, store }
    }

    /// Evaluate every active rule of `requirement_id` for the asset and record the outcome.
    pub fn assess_asset_requirement(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
        assessed_by: Option<UserId>,
    ) -> Result<RequirementAssessmentOutcome, AssessmentError> {
        self.assess_asset_requirement_as(
            asset_type,
            asset_id,
            requirement_id,
            assessed_by,
            AssessmentType::Automatic,
        )
    }

    /// Same as [`Self::assess_asset_requirement`] with an explicit history tag.
    pub fn assess_asset_requirement_as(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
        assessed_by: Option<UserId>,
        assessment_type: AssessmentType,
    ) -> Result<RequirementAssessmentOutcome, AssessmentError> {
        let asset = self.assets.get_asset(asset_type, asset_id)?;
        let requirement = self.load_requirement(requirement_id)?;
        self.evaluate_and_record(&asset, &requirement, assessed_by, assessment_type)
    }

    /// Assess the asset against every requirement of the frameworks it declares.
    ///
    /// Requirements are processed in store order; an asset declaring no
    /// frameworks yields an empty list.
    pub fn assess_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        assessed_by: Option<UserId>,
    ) -> Result<Vec<RequirementAssessmentOutcome>, AssessmentError> {
        let asset = self.assets.get_asset(asset_type, asset_id)?;
        let frameworks = asset.declared_frameworks();
        if frameworks.is_empty() {
            info!(%asset_type, %asset_id, "asset declares no compliance frameworks");
            return Ok(Vec::new());
        }

        let requirements = self.store.requirements_for_frameworks(&frameworks)?;
        requirements
            .iter()
            .map(|requirement| {
                self.evaluate_and_record(
                    &asset,
                    requirement,
                    assessed_by.clone(),
                    AssessmentType::Automatic,
                )
            })
            .collect()
    }

    /// Assess each asset in turn, isolating failures per asset.
    pub fn bulk_assess(
        &self,
        asset_type: AssetType,
        asset_ids: &[AssetId],
        assessed_by: Option<UserId>,
    ) -> BulkAssessmentReport {
        let mut report = BulkAssessmentReport {
            total_assessed: asset_ids.len(),
            successful: 0,
            failed: 0,
            results: Vec::new(),
            errors: Vec::new(),
        };

        for asset_id in asset_ids {
            match self.assess_asset(asset_type, asset_id, assessed_by.clone()) {
                Ok(mut outcomes) => {
                    report.successful += 1;
                    report.results.append(&mut outcomes);
                }
                Err(error) => {
                    warn!(%asset_type, %asset_id, %error, "bulk assessment failed for asset");
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("Failed to assess asset {asset_id}: {error}"));
                }
            }
        }

        report
    }

    /// Current persisted status of every requirement mapped to the asset.
    pub fn asset_compliance_status(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetComplianceStatus, AssessmentError> {
        let mut mappings = self.store.mappings_for_asset(asset_type, asset_id)?;
        mappings.sort_by(|a, b| a.requirement_id.cmp(&b.requirement_id));

        let counts = StatusCounts::tally(mappings.iter().map(|mapping| mapping.compliance_status));

        let mut requirements = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let requirement = self.store.requirement(&mapping.requirement_id)?;
            let latest = self
                .store
                .latest_assessment(asset_type, asset_id, &mapping.requirement_id)?;

            requirements.push(RequirementComplianceView {
                requirement_code: requirement.as_ref().map(|r| r.code.clone()),
                requirement_title: requirement.map(|r| r.title),
                requirement_id: mapping.requirement_id,
                compliance_status: mapping.compliance_status,
                last_assessed_at: mapping.last_assessed_at,
                assessed_by_id: mapping.assessed_by_id,
                auto_assessed: mapping.auto_assessed,
                last_assessment_id: latest.as_ref().map(|row| row.id.clone()),
                rule_results: latest.map(|row| row.validation_results).unwrap_or_default(),
            });
        }

        Ok(AssetComplianceStatus {
            asset_type,
            asset_id: asset_id.clone(),
            total_requirements: counts.total,
            overall_compliance_percentage: counts.compliance_percentage(),
            counts,
            requirements,
        })
    }

    /// Requirements the asset currently fails or partially meets, with remediation hints.
    pub fn compliance_gaps(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<Vec<ComplianceGap>, AssessmentError> {
        let mut mappings = self.store.mappings_for_asset(asset_type, asset_id)?;
        mappings.retain(|mapping| mapping.compliance_status.is_gap());
        mappings.sort_by(|a, b| a.requirement_id.cmp(&b.requirement_id));

        let mut gaps = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let requirement = self.store.requirement(&mapping.requirement_id)?;
            let failed_rules: Vec<RuleEvaluationResult> = self
                .store
                .latest_assessment(asset_type, asset_id, &mapping.requirement_id)?
                .map(|row| row.validation_results)
                .unwrap_or_default()
                .into_iter()
                .filter(|result| result.status.is_gap())
                .collect();

            gaps.push(ComplianceGap {
                requirement_code: requirement.as_ref().map(|r| r.code.clone()),
                requirement_title: requirement.map(|r| r.title),
                requirement_id: mapping.requirement_id,
                compliance_status: mapping.compliance_status,
                last_assessed_at: mapping.last_assessed_at,
                recommendations: recommendations_for(&failed_rules),
                failed_rules,
            });
        }

        Ok(gaps)
    }

    /// Record a reviewer decision; the history row carries no rule results.
    pub fn record_manual_assessment(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
        assessment: ManualAssessment,
        assessed_by: Option<UserId>,
    ) -> Result<RequirementAssessmentOutcome, AssessmentError> {
        if assessment.status == ComplianceStatus::NotAssessed {
            return Err(AssessmentError::InvalidStatus(assessment.status));
        }

        self.assets.get_asset(asset_type, asset_id)?;
        let requirement = self.load_requirement(requirement_id)?;

        let ManualAssessment {
            status,
            notes,
            evidence_urls,
        } = assessment;

        self.persist(
            asset_type,
            asset_id,
            &requirement,
            PendingAssessment {
                status,
                rule_results: Vec::new(),
                assessment_type: AssessmentType::Manual,
                assessed_by,
                notes,
                evidence_urls: Some(evidence_urls),
            },
        )
    }

    /// Full history for the pair, oldest first.
    pub fn assessment_history(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Vec<ComplianceAssessment>, AssessmentError> {
        Ok(self.store.assessments(asset_type, asset_id, requirement_id)?)
    }

    pub fn create_rule(&self, rule: NewValidationRule) -> Result<ValidationRule, AssessmentError> {
        self.load_requirement(&rule.requirement_id)?;
        let stored = self.store.insert_rule(rule.into_rule(next_rule_id(), Utc::now()))?;
        info!(
            rule_id = %stored.id,
            requirement_id = %stored.requirement_id,
            "validation rule created"
        );
        Ok(stored)
    }

    pub fn get_rule(&self, rule_id: &RuleId) -> Result<ValidationRule, AssessmentError> {
        self.store
            .rule(rule_id)?
            .ok_or_else(|| AssessmentError::RuleNotFound(rule_id.clone()))
    }

    pub fn list_rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, AssessmentError> {
        Ok(self.store.rules(filter)?)
    }

    pub fn update_rule(
        &self,
        rule_id: &RuleId,
        update: ValidationRuleUpdate,
    ) -> Result<ValidationRule, AssessmentError> {
        let mut rule = self.get_rule(rule_id)?;
        update.apply(&mut rule, Utc::now());
        self.store.update_rule(rule.clone()).map_err(|error| match error {
            RepositoryError::NotFound => AssessmentError::RuleNotFound(rule_id.clone()),
            other => other.into(),
        })?;
        Ok(rule)
    }

    pub fn delete_rule(&self, rule_id: &RuleId) -> Result<(), AssessmentError> {
        self.store.delete_rule(rule_id).map_err(|error| match error {
            RepositoryError::NotFound => AssessmentError::RuleNotFound(rule_id.clone()),
            other => other.into(),
        })?;
        info!(%rule_id, "validation rule deleted");
        Ok(())
    }

    fn load_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Requirement, AssessmentError> {
        self.store
            .requirement(requirement_id)?
            .ok_or_else(|| AssessmentError::RequirementNotFound(requirement_id.clone()))
    }

    fn evaluate_and_record(
        &self,
        asset: &AssetRecord,
        requirement: &Requirement,
        assessed_by: Option<UserId>,
        assessment_type: AssessmentType,
    ) -> Result<RequirementAssessmentOutcome, AssessmentError> {
        let rules = self.store.active_rules(&requirement.id, asset.asset_type)?;
        let rule_results: Vec<RuleEvaluationResult> = rules
            .iter()
            .map(|rule| evaluate_rule(rule, asset))
            .collect();
        let status = resolve_requirement_status(&rule_results);

        self.persist(
            asset.asset_type,
            &asset.asset_id,
            requirement,
            PendingAssessment {
                status,
                rule_results,
                assessment_type,
                assessed_by,
                notes: None,
                evidence_urls: None,
            },
        )
    }

    fn persist(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement: &Requirement,
        pending: PendingAssessment,
    ) -> Result<RequirementAssessmentOutcome, AssessmentError> {
        let assessed_at = Utc::now();
        let auto_assessed = pending.assessment_type != AssessmentType::Manual;

        let mapping = AssetRequirementMapping {
            asset_type,
            asset_id: asset_id.clone(),
            requirement_id: requirement.id.clone(),
            compliance_status: pending.status,
            last_assessed_at: Some(assessed_at),
            assessed_by_id: pending.assessed_by.clone(),
            evidence_urls: Vec::new(),
            notes: pending.notes.clone(),
            auto_assessed,
        };

        // Previous status is settled by the store under the same write.
        let assessment = ComplianceAssessment {
            id: next_assessment_id(),
            asset_type,
            asset_id: asset_id.clone(),
            requirement_id: requirement.id.clone(),
            assessment_type: pending.assessment_type,
            previous_status: ComplianceStatus::NotAssessed,
            new_status: pending.status,
            validation_results: pending.rule_results.clone(),
            assessed_by_id: pending.assessed_by,
            assessed_at,
            notes: pending.notes,
        };

        let recorded = self.store.record_assessment(AssessmentWrite {
            mapping,
            assessment,
            evidence_urls: pending.evidence_urls,
        })?;

        info!(
            %asset_type,
            %asset_id,
            requirement_id = %requirement.id,
            from = %recorded.previous_status,
            to = %recorded.new_status,
            "compliance assessment recorded"
        );

        Ok(RequirementAssessmentOutcome {
            assessment_id: recorded.id,
            asset_type,
            asset_id: asset_id.clone(),
            requirement_id: requirement.id.clone(),
            previous_status: recorded.previous_status,
            compliance_status: recorded.new_status,
            recommendations: recommendations_for(&pending.rule_results),
            rule_results: pending.rule_results,
            assessed_at: recorded.assessed_at,
        })
    }
}

struct PendingAssessment {
    status: ComplianceStatus,
    rule_results: Vec<RuleEvaluationResult>,
    assessment_type: AssessmentType,
    assessed_by: Option<UserId>,
    notes: Option<String>,
    evidence_urls: Option<Vec<String>>,
}

/// One remediation line per failing or partial rule result, in rule order.
pub fn recommendations_for(results: &[RuleEvaluationResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|result| match result.status {
            ComplianceStatus::NonCompliant => Some(format!(
                "Fix issue identified by rule: {} - {}",
                result.rule_name, result.message
            )),
            ComplianceStatus::PartiallyCompliant => Some(format!(
                "Improve compliance for rule: {} - {}",
                result.rule_name, result.message
            )),
            _ => None,
        })
        .collect()
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("{asset_type} asset {asset_id} not found")]
    AssetNotFound {
        asset_type: AssetType,
        asset_id: AssetId,
    },
    #[error("requirement {0} not found")]
    RequirementNotFound(RequirementId),
    #[error("validation rule {0} not found")]
    RuleNotFound(RuleId),
    #[error("{0} cannot be recorded as an assessment outcome")]
    InvalidStatus(ComplianceStatus),
    #[error("asset lookup failed: {0}")]
    AssetLookup(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl AssessmentError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AssessmentError::AssetNotFound { .. }
                | AssessmentError::RequirementNotFound(_)
                | AssessmentError::RuleNotFound(_)
                | AssessmentError::Repository(RepositoryError::NotFound)
        )
    }
}

impl From<AssetLookupError> for AssessmentError {
    fn from(value: AssetLookupError) -> Self {
        match value {
            AssetLookupError::NotFound {
                asset_type,
                asset_id,
            } => AssessmentError::AssetNotFound {
                asset_type,
                asset_id,
            },
            AssetLookupError::Unavailable(message) => AssessmentError::AssetLookup(message),
        }
    }
}
