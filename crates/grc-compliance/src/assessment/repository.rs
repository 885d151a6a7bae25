use super::domain::{
    AssetId, AssetProfile, AssetRecord, AssetRequirementMapping, AssetType, ComplianceAssessment,
    ComplianceStatus, FrameworkId, Requirement, RequirementId, RuleId,
};
use super::rules::ValidationRule;

/// Lookup capability owned by the asset register services.
pub trait AssetDirectory: Send + Sync {
    fn get_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetRecord, AssetLookupError>;

    /// Display attributes for reporting; `None` when the asset is unknown.
    fn describe_asset(&self, asset_type: AssetType, asset_id: &AssetId) -> Option<AssetProfile>;
}

/// Failure raised by the asset directory.
#[derive(Debug, thiserror::Error)]
pub enum AssetLookupError {
    #[error("{asset_type} asset {asset_id} not found")]
    NotFound {
        asset_type: AssetType,
        asset_id: AssetId,
    },
    #[error("asset directory unavailable: {0}")]
    Unavailable(String),
}

/// Storage for requirements, validation rules, mappings, and assessment history.
///
/// Mapping and history writes only happen through [`ComplianceRepository::record_assessment`],
/// which implementations must apply atomically.
pub trait ComplianceRepository: Send + Sync {
    fn requirement(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError>;
    fn requirements_for_frameworks(
        &self,
        frameworks: &[FrameworkId],
    ) -> Result<Vec<Requirement>, RepositoryError>;

    fn insert_rule(&self, rule: ValidationRule) -> Result<ValidationRule, RepositoryError>;
    fn rule(&self, id: &RuleId) -> Result<Option<ValidationRule>, RepositoryError>;
    fn rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, RepositoryError>;
    fn update_rule(&self, rule: ValidationRule) -> Result<(), RepositoryError>;
    fn delete_rule(&self, id: &RuleId) -> Result<(), RepositoryError>;
    /// Active rules for the pair, highest priority first, ties broken by rule id.
    fn active_rules(
        &self,
        requirement_id: &RequirementId,
        asset_type: AssetType,
    ) -> Result<Vec<ValidationRule>, RepositoryError>;

    fn mapping(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<AssetRequirementMapping>, RepositoryError>;
    fn mappings_for_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError>;
    fn all_mappings(
        &self,
        asset_type: Option<AssetType>,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError>;

    /// Resolves the write against the stored mapping, upserts the mapping, and appends the
    /// history row as one unit. Returns the row as appended.
    fn record_assessment(
        &self,
        write: AssessmentWrite,
    ) -> Result<ComplianceAssessment, RepositoryError>;
    /// History rows for the pair, oldest first.
    fn assessments(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Vec<ComplianceAssessment>, RepositoryError>;
    fn latest_assessment(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<ComplianceAssessment>, RepositoryError>;
}

/// A pending mapping upsert plus its history row.
///
/// The previous status and any retained evidence or notes depend on the stored mapping, so
/// repositories settle them through [`AssessmentWrite::resolve`] inside the atomic write.
#[derive(Debug, Clone)]
pub struct AssessmentWrite {
    pub mapping: AssetRequirementMapping,
    pub assessment: ComplianceAssessment,
    /// Evidence supplied with this assessment; `None` keeps the stored evidence.
    pub evidence_urls: Option<Vec<String>>,
}

impl AssessmentWrite {
    pub fn resolve(
        self,
        stored: Option<&AssetRequirementMapping>,
    ) -> (AssetRequirementMapping, ComplianceAssessment) {
        let AssessmentWrite {
            mut mapping,
            mut assessment,
            evidence_urls,
        } = self;

        assessment.previous_status = stored
            .map(|existing| existing.compliance_status)
            .unwrap_or(ComplianceStatus::NotAssessed);
        match stored {
            Some(existing) => {
                mapping.evidence_urls =
                    evidence_urls.unwrap_or_else(|| existing.evidence_urls.clone());
                if mapping.notes.is_none() {
                    mapping.notes = existing.notes.clone();
                }
            }
            None => mapping.evidence_urls = evidence_urls.unwrap_or_default(),
        }

        (mapping, assessment)
    }
}

/// Optional narrowing for rule listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFilter {
    pub requirement_id: Option<RequirementId>,
    pub asset_type: Option<AssetType>,
}

impl RuleFilter {
    pub fn matches(&self, rule: &ValidationRule) -> bool {
        self.requirement_id
            .as_ref()
            .map_or(true, |id| *id == rule.requirement_id)
            && self.asset_type.map_or(true, |kind| kind == rule.asset_type)
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
