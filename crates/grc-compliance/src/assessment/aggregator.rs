use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AssetId, AssetProfile, AssetType, ComplianceStatus};
use super::repository::{AssetDirectory, ComplianceRepository, RepositoryError};
use super::rules::{resolve_asset_overall_status, StatusCounts};
use crate::config::ReportingConfig;

const MAX_PAGE_SIZE: u32 = 100;

/// Filters and paging for the cross-asset compliance listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetComplianceQuery {
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub compliance_status: Option<ComplianceStatus>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub criticality: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
    /// Out-of-range values are clamped rather than rejected.
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

/// One asset row of the listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetComplianceEntry {
    pub asset_type: AssetType,
    pub asset_id: AssetId,
    pub name: Option<String>,
    pub identifier: Option<String>,
    pub criticality: Option<String>,
    pub business_unit: Option<String>,
    pub counts: StatusCounts,
    pub compliance_percentage: u32,
    pub overall_status: ComplianceStatus,
    pub last_assessed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
    pub total_pages: u32,
}

/// Totals over every asset matching the filters, before paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub total_assets: usize,
    pub compliant_assets: usize,
    pub non_compliant_assets: usize,
    pub partially_compliant_assets: usize,
    pub not_assessed_assets: usize,
    pub average_compliance_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetComplianceReport {
    pub assets: Vec<AssetComplianceEntry>,
    pub pagination: Pagination,
    pub summary: ComplianceSummary,
}

/// Read-only roll-up of mappings across assets, enriched with directory attributes.
pub struct AssetComplianceAggregator<A, S> {
    assets: Arc<A>,
    store: Arc<S>,
    reporting: ReportingConfig,
}

impl<A, S> AssetComplianceAggregator<A, S>
where
    A: AssetDirectory + 'static,
    S: ComplianceRepository + 'static,
{
    pub fn new(assets: Arc<A>, store: Arc<S>, reporting: ReportingConfig) -> Self {
        Self {
            assets,
            store,
            reporting,
        }
    }

    pub fn report(
        &self,
        query: &AssetComplianceQuery,
    ) -> Result<AssetComplianceReport, RepositoryError> {
        let page = query.page.unwrap_or(1).clamp(1, i64::from(u32::MAX)) as u32;
        let page_size = query
            .page_size
            .unwrap_or_else(|| i64::from(self.reporting.default_page_size))
            .clamp(1, i64::from(MAX_PAGE_SIZE)) as u32;

        let mut grouped: BTreeMap<(AssetType, AssetId), (StatusCounts, Option<DateTime<Utc>>)> =
            BTreeMap::new();
        for mapping in self.store.all_mappings(query.asset_type)? {
            let entry = grouped
                .entry((mapping.asset_type, mapping.asset_id))
                .or_default();
            entry.0.record(mapping.compliance_status);
            entry.1 = entry.1.max(mapping.last_assessed_at);
        }

        let mut matched: Vec<AssetComplianceEntry> = grouped
            .into_iter()
            .map(|((asset_type, asset_id), (counts, last_assessed_at))| {
                let profile = self
                    .assets
                    .describe_asset(asset_type, &asset_id)
                    .unwrap_or_default();
                build_entry(asset_type, asset_id, profile, counts, last_assessed_at)
            })
            .filter(|entry| matches_query(entry, query))
            .collect();

        matched.sort_by(|a, b| {
            b.last_assessed_at
                .cmp(&a.last_assessed_at)
                .then_with(|| a.asset_type.cmp(&b.asset_type))
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });

        let summary = summarize(&matched);
        let total = matched.len();
        let total_pages = total.div_ceil(page_size as usize) as u32;
        let offset = (page as usize - 1).saturating_mul(page_size as usize);
        let assets = matched
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok(AssetComplianceReport {
            assets,
            pagination: Pagination {
                page,
                page_size,
                total,
                total_pages,
            },
            summary,
        })
    }
}

fn build_entry(
    asset_type: AssetType,
    asset_id: AssetId,
    profile: AssetProfile,
    counts: StatusCounts,
    last_assessed_at: Option<DateTime<Utc>>,
) -> AssetComplianceEntry {
    AssetComplianceEntry {
        asset_type,
        asset_id,
        name: profile.name,
        identifier: profile.identifier,
        criticality: profile.criticality,
        business_unit: profile.business_unit,
        compliance_percentage: counts.compliance_percentage(),
        overall_status: resolve_asset_overall_status(&counts),
        counts,
        last_assessed_at,
    }
}

fn matches_query(entry: &AssetComplianceEntry, query: &AssetComplianceQuery) -> bool {
    if query
        .compliance_status
        .is_some_and(|status| status != entry.overall_status)
    {
        return false;
    }

    if !same_label(query.business_unit.as_deref(), entry.business_unit.as_deref()) {
        return false;
    }

    if !same_label(query.criticality.as_deref(), entry.criticality.as_deref()) {
        return false;
    }

    match query
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
    {
        Some(term) => {
            let needle = term.to_lowercase();
            [
                entry.name.as_deref(),
                entry.identifier.as_deref(),
                Some(entry.asset_id.as_str()),
            ]
            .into_iter()
            .flatten()
            .any(|haystack| haystack.to_lowercase().contains(&needle))
        }
        None => true,
    }
}

fn same_label(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match wanted {
        Some(wanted) => actual.is_some_and(|actual| actual.eq_ignore_ascii_case(wanted.trim())),
        None => true,
    }
}

fn summarize(entries: &[AssetComplianceEntry]) -> ComplianceSummary {
    let mut summary = ComplianceSummary {
        total_assets: entries.len(),
        ..ComplianceSummary::default()
    };

    for entry in entries {
        match entry.overall_status {
            ComplianceStatus::Compliant => summary.compliant_assets += 1,
            ComplianceStatus::NonCompliant => summary.non_compliant_assets += 1,
            ComplianceStatus::PartiallyCompliant => summary.partially_compliant_assets += 1,
            _ => summary.not_assessed_assets += 1,
        }
    }

    if !entries.is_empty() {
        let total: u32 = entries.iter().map(|entry| entry.compliance_percentage).sum();
        summary.average_compliance_percentage =
            (f64::from(total) / entries.len() as f64).round() as u32;
    }

    summary
}
