use serde::{Deserialize, Serialize};

use super::super::domain::ComplianceStatus;
use super::RuleEvaluationResult;

/// Folds the per-rule results of one (asset, requirement) pair into a single status.
///
/// Only applicable results count. Precedence: nothing applicable is
/// `NotApplicable`; one non-compliant result fails the requirement; compliance
/// must be unanimous; any partial result yields partial; otherwise review.
pub fn resolve_requirement_status(results: &[RuleEvaluationResult]) -> ComplianceStatus {
    let applicable: Vec<ComplianceStatus> = results
        .iter()
        .filter(|result| result.applicable)
        .map(|result| result.status)
        .collect();

    if applicable.is_empty() {
        return ComplianceStatus::NotApplicable;
    }

    if applicable.contains(&ComplianceStatus::NonCompliant) {
        return ComplianceStatus::NonCompliant;
    }

    if applicable
        .iter()
        .all(|status| *status == ComplianceStatus::Compliant)
    {
        return ComplianceStatus::Compliant;
    }

    if applicable.contains(&ComplianceStatus::PartiallyCompliant) {
        return ComplianceStatus::PartiallyCompliant;
    }

    ComplianceStatus::RequiresReview
}

/// Per-status tally of an asset's requirement mappings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub partially_compliant: usize,
    pub not_applicable: usize,
    pub requires_review: usize,
    pub not_assessed: usize,
}

impl StatusCounts {
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ComplianceStatus>,
    {
        let mut counts = Self::default();
        for status in statuses {
            counts.record(status);
        }
        counts
    }

    pub fn record(&mut self, status: ComplianceStatus) {
        self.total += 1;
        match status {
            ComplianceStatus::Compliant => self.compliant += 1,
            ComplianceStatus::NonCompliant => self.non_compliant += 1,
            ComplianceStatus::PartiallyCompliant => self.partially_compliant += 1,
            ComplianceStatus::NotApplicable => self.not_applicable += 1,
            ComplianceStatus::RequiresReview => self.requires_review += 1,
            ComplianceStatus::NotAssessed => self.not_assessed += 1,
        }
    }

    /// `round(compliant / total * 100)`, zero when nothing is mapped.
    pub fn compliance_percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.compliant as f64 / self.total as f64 * 100.0).round() as u32
    }
}

/// Roll-up status of an asset across all of its mapped requirements.
///
/// Differs from [`resolve_requirement_status`]: an asset with no decisive
/// mapping is reported as `NotAssessed` rather than needing review.
pub fn resolve_asset_overall_status(counts: &StatusCounts) -> ComplianceStatus {
    if counts.total > 0 && counts.compliant == counts.total {
        ComplianceStatus::Compliant
    } else if counts.non_compliant > 0 {
        ComplianceStatus::NonCompliant
    } else if counts.partially_compliant > 0 {
        ComplianceStatus::PartiallyCompliant
    } else {
        ComplianceStatus::NotAssessed
    }
}
