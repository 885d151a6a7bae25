//! Rule-based compliance assessment of register assets.
//!
//! Validation rules are evaluated against asset records fetched from an
//! [`AssetDirectory`]; the resulting requirement status is upserted as a
//! mapping and appended to the assessment history through a
//! [`ComplianceRepository`]. The aggregator rolls mappings up across assets
//! for reporting.

pub mod aggregator;
pub mod domain;
pub mod inventory;
pub mod memory;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;

#[cfg(test)]
mod tests;

pub use aggregator::{
    AssetComplianceAggregator, AssetComplianceEntry, AssetComplianceQuery, AssetComplianceReport,
    ComplianceSummary, Pagination,
};
pub use domain::{
    AssessmentId, AssessmentType, AssetId, AssetProfile, AssetRecord, AssetRequirementMapping,
    AssetType, ComplianceAssessment, ComplianceStatus, FieldValue, FrameworkId, Requirement,
    RequirementId, RuleId, UserId, COMPLIANCE_FRAMEWORKS_FIELD,
};
pub use inventory::{CsvAssetInventory, InventoryError};
pub use memory::{InMemoryAssetDirectory, InMemoryComplianceStore};
pub use repository::{
    AssessmentWrite, AssetDirectory, AssetLookupError, ComplianceRepository, RepositoryError,
    RuleFilter,
};
pub use router::{compliance_router, ComplianceApi, ACTING_USER_HEADER};
pub use rules::{
    evaluate_rule, Criterion, NewValidationRule, Operator, RuleEvaluationResult, StatusCounts,
    ValidationLogic, ValidationRule, ValidationRuleUpdate,
};
pub use service::{
    AssessmentError, AssetComplianceStatus, BulkAssessmentReport, ComplianceAssessmentService,
    ComplianceGap, ManualAssessment, RequirementAssessmentOutcome, RequirementComplianceView,
};
