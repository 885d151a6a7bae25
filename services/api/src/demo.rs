use crate::infra::{seed_assets, seeded_api, SeededApi};
use clap::Args;
use grc_compliance::assessment::{
    AssessmentError, AssetComplianceQuery, AssetId, AssetType, ComplianceStatus, ManualAssessment,
    RequirementId, UserId,
};
use grc_compliance::config::ReportingConfig;
use grc_compliance::error::AppError;

const DEMO_SCHEDULER: &str = "demo-scheduler";
const DEMO_REVIEWER: &str = "demo-ciso";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the manual override step for the payments gateway.
    #[arg(long)]
    pub(crate) skip_manual: bool,
    /// Page size for the portfolio listing (defaults to the configured value).
    #[arg(long)]
    pub(crate) page_size: Option<u32>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        skip_manual,
        page_size,
    } = args;

    let reporting = page_size
        .map(ReportingConfig::new)
        .unwrap_or_default();
    let api = seeded_api(reporting)?;

    println!("Compliance assessment demo");
    assess_register(&api);

    let gateway = AssetId::new("srv-002");
    render_gaps(&api, AssetType::Physical, &gateway)?;

    if !skip_manual {
        record_override(&api, &gateway)?;
    }

    render_portfolio(&api)?;
    Ok(())
}

fn assess_register(api: &SeededApi) {
    let assets = seed_assets();
    for asset_type in AssetType::ordered() {
        let ids: Vec<AssetId> = assets
            .iter()
            .filter(|asset| asset.asset_type == asset_type)
            .map(|asset| asset.asset_id.clone())
            .collect();
        if ids.is_empty() {
            continue;
        }

        let report = api
            .service
            .bulk_assess(asset_type, &ids, Some(UserId::new(DEMO_SCHEDULER)));
        println!(
            "\n{} assets: {} assessed, {} succeeded, {} failed",
            asset_type, report.total_assessed, report.successful, report.failed
        );
        for outcome in &report.results {
            println!(
                "- {} / {}: {} (was {})",
                outcome.asset_id,
                outcome.requirement_id,
                outcome.compliance_status,
                outcome.previous_status
            );
        }
        for error in &report.errors {
            println!("  ! {error}");
        }
    }
}

fn render_gaps(api: &SeededApi, asset_type: AssetType, asset_id: &AssetId) -> Result<(), AppError> {
    let gaps = api.service.compliance_gaps(asset_type, asset_id)?;
    if gaps.is_empty() {
        println!("\nCompliance gaps for {asset_id}: none");
        return Ok(());
    }

    println!("\nCompliance gaps for {asset_id}");
    for gap in &gaps {
        println!(
            "- {} {}: {}",
            gap.requirement_code.as_deref().unwrap_or("?"),
            gap.requirement_title.as_deref().unwrap_or("untitled requirement"),
            gap.compliance_status
        );
        for recommendation in &gap.recommendations {
            println!("    {recommendation}");
        }
    }
    Ok(())
}

fn record_override(api: &SeededApi, asset_id: &AssetId) -> Result<(), AppError> {
    let requirement = RequirementId::new("iso-a.8.24");
    let outcome = api.service.record_manual_assessment(
        AssetType::Physical,
        asset_id,
        &requirement,
        ManualAssessment {
            status: ComplianceStatus::Compliant,
            notes: Some("Self-encrypting drives verified during maintenance window".to_string()),
            evidence_urls: vec!["https://evidence.example/srv-002/sed-report".to_string()],
        },
        Some(UserId::new(DEMO_REVIEWER)),
    )?;
    println!(
        "\nManual override for {} / {}: {} -> {}",
        asset_id, requirement, outcome.previous_status, outcome.compliance_status
    );

    let history = api
        .service
        .assessment_history(AssetType::Physical, asset_id, &requirement)?;
    for row in &history {
        println!(
            "- {} {:?}: {} -> {}",
            row.assessed_at.format("%Y-%m-%d %H:%M:%S"),
            row.assessment_type,
            row.previous_status,
            row.new_status
        );
    }
    Ok(())
}

fn render_portfolio(api: &SeededApi) -> Result<(), AppError> {
    let report = api
        .aggregator
        .report(&AssetComplianceQuery::default())
        .map_err(AssessmentError::from)?;

    let summary = &report.summary;
    println!(
        "\nPortfolio: {} assets | {} compliant | {} non-compliant | {} partial | {} not assessed | {}% average",
        summary.total_assets,
        summary.compliant_assets,
        summary.non_compliant_assets,
        summary.partially_compliant_assets,
        summary.not_assessed_assets,
        summary.average_compliance_percentage
    );
    for entry in &report.assets {
        println!(
            "- [{}] {} {} ({}%, {})",
            entry.asset_type,
            entry.asset_id,
            entry.name.as_deref().unwrap_or("unnamed"),
            entry.compliance_percentage,
            entry.overall_status
        );
    }
    println!(
        "Page {}/{} ({} per page)",
        report.pagination.page,
        report.pagination.total_pages.max(1),
        report.pagination.page_size
    );
    Ok(())
}
