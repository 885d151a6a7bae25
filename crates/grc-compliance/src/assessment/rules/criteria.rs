use super::super::domain::AssetRecord;
use super::model::Criterion;
use super::operators::evaluate_operator;
use super::resolver::resolve_field;

/// Logical AND over `criteria`. An empty group is vacuously true.
pub fn evaluate_all(criteria: &[Criterion], asset: &AssetRecord) -> bool {
    criteria
        .iter()
        .all(|criterion| criterion_matches(criterion, asset))
}

pub fn criterion_matches(criterion: &Criterion, asset: &AssetRecord) -> bool {
    let resolved = resolve_field(&asset.fields, &criterion.field);
    evaluate_operator(resolved, &criterion.operator, &criterion.value)
}
