use chrono::Utc;
use clap::Args;
use grc_compliance::assessment::rules::resolve_requirement_status;
use grc_compliance::assessment::service::recommendations_for;
use grc_compliance::assessment::{
    evaluate_rule, AssetId, AssetType, ComplianceStatus, CsvAssetInventory, NewValidationRule,
    RequirementId, RuleEvaluationResult, RuleId, ValidationRule,
};
use grc_compliance::error::AppError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding an array of validation rules
    #[arg(long)]
    pub(crate) rules: PathBuf,
    /// CSV asset inventory, one asset per row with a required `id` column
    #[arg(long)]
    pub(crate) assets: PathBuf,
    /// Asset type shared by every row of the inventory
    #[arg(long, value_parser = crate::infra::parse_asset_type)]
    pub(crate) asset_type: AssetType,
    /// Print JSON instead of the text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequirementEvaluation {
    pub(crate) requirement_id: RequirementId,
    pub(crate) compliance_status: ComplianceStatus,
    pub(crate) rule_results: Vec<RuleEvaluationResult>,
    pub(crate) recommendations: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssetEvaluation {
    pub(crate) asset_id: AssetId,
    pub(crate) name: Option<String>,
    pub(crate) requirements: Vec<RequirementEvaluation>,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        rules,
        assets,
        asset_type,
        json,
    } = args;

    let raw_rules = std::fs::read_to_string(&rules)?;
    let rules: Vec<NewValidationRule> = serde_json::from_str(&raw_rules)?;
    let inventory = CsvAssetInventory::from_path(&assets, asset_type)?;
    info!(
        rules = rules.len(),
        assets = inventory.len(),
        %asset_type,
        "evaluating inventory"
    );

    let evaluations = evaluate_inventory(rules, &inventory);

    if json {
        match serde_json::to_string_pretty(&evaluations) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("Evaluation payload unavailable: {err}"),
        }
        return Ok(());
    }

    render_evaluations(asset_type, &evaluations);
    Ok(())
}

/// Applies every active rule for the inventory's asset type to each asset, grouped by requirement.
pub(crate) fn evaluate_inventory(
    rules: Vec<NewValidationRule>,
    inventory: &CsvAssetInventory,
) -> Vec<AssetEvaluation> {
    let now = Utc::now();
    let mut rules: Vec<ValidationRule> = rules
        .into_iter()
        .enumerate()
        .map(|(index, rule)| rule.into_rule(RuleId::new(format!("cli-{:03}", index + 1)), now))
        .filter(|rule| rule.is_active && rule.asset_type == inventory.asset_type())
        .collect();
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

    let mut by_requirement: BTreeMap<RequirementId, Vec<&ValidationRule>> = BTreeMap::new();
    for rule in &rules {
        by_requirement
            .entry(rule.requirement_id.clone())
            .or_default()
            .push(rule);
    }

    inventory
        .assets()
        .map(|asset| {
            let requirements = by_requirement
                .iter()
                .map(|(requirement_id, rules)| {
                    let rule_results: Vec<RuleEvaluationResult> =
                        rules.iter().map(|rule| evaluate_rule(rule, asset)).collect();
                    RequirementEvaluation {
                        requirement_id: requirement_id.clone(),
                        compliance_status: resolve_requirement_status(&rule_results),
                        recommendations: recommendations_for(&rule_results),
                        rule_results,
                    }
                })
                .collect();

            AssetEvaluation {
                asset_id: asset.asset_id.clone(),
                name: asset.profile().name,
                requirements,
            }
        })
        .collect()
}

fn render_evaluations(asset_type: AssetType, evaluations: &[AssetEvaluation]) {
    println!(
        "Evaluated {} {} asset(s)",
        evaluations.len(),
        asset_type
    );

    for evaluation in evaluations {
        match &evaluation.name {
            Some(name) => println!("\n{} ({})", evaluation.asset_id, name),
            None => println!("\n{}", evaluation.asset_id),
        }

        if evaluation.requirements.is_empty() {
            println!("- no active rules for this asset type");
        }
        for requirement in &evaluation.requirements {
            println!(
                "- {}: {}",
                requirement.requirement_id, requirement.compliance_status
            );
            for result in &requirement.rule_results {
                println!(
                    "    {} -> {} ({})",
                    result.rule_name, result.status, result.message
                );
            }
            for recommendation in &requirement.recommendations {
                println!("    ! {recommendation}");
            }
        }
    }
}
