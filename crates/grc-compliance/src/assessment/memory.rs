use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    AssetId, AssetProfile, AssetRecord, AssetRequirementMapping, AssetType, ComplianceAssessment,
    FrameworkId, MappingKey, Requirement, RequirementId, RuleId,
};
use super::repository::{
    AssessmentWrite, AssetDirectory, AssetLookupError, ComplianceRepository, RepositoryError,
    RuleFilter,
};
use super::rules::ValidationRule;

#[derive(Debug, Default)]
struct StoreState {
    requirements: BTreeMap<RequirementId, Requirement>,
    rules: BTreeMap<RuleId, ValidationRule>,
    mappings: BTreeMap<MappingKey, AssetRequirementMapping>,
    history: Vec<ComplianceAssessment>,
}

/// Process-local store backing the service, the CLI demo, and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryComplianceStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryComplianceStore {
    pub fn with_requirements<I>(requirements: I) -> Self
    where
        I: IntoIterator<Item = Requirement>,
    {
        let store = Self::default();
        if let Ok(mut state) = store.state.lock() {
            for requirement in requirements {
                state
                    .requirements
                    .insert(requirement.id.clone(), requirement);
            }
        }
        store
    }

    /// Number of history rows across every asset.
    pub fn history_len(&self) -> usize {
        self.state().map(|state| state.history.len()).unwrap_or(0)
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn same_pair(
    assessment: &ComplianceAssessment,
    asset_type: AssetType,
    asset_id: &AssetId,
    requirement_id: &RequirementId,
) -> bool {
    assessment.asset_type == asset_type
        && assessment.asset_id == *asset_id
        && assessment.requirement_id == *requirement_id
}

impl ComplianceRepository for InMemoryComplianceStore {
    fn requirement(&self, id: &RequirementId) -> Result<Option<Requirement>, RepositoryError> {
        Ok(self.state()?.requirements.get(id).cloned())
    }

    fn requirements_for_frameworks(
        &self,
        frameworks: &[FrameworkId],
    ) -> Result<Vec<Requirement>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .requirements
            .values()
            .filter(|requirement| frameworks.contains(&requirement.framework_id))
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: ValidationRule) -> Result<ValidationRule, RepositoryError> {
        let mut state = self.state()?;
        if state.rules.contains_key(&rule.id) {
            return Err(RepositoryError::Conflict);
        }
        state.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn rule(&self, id: &RuleId) -> Result<Option<ValidationRule>, RepositoryError> {
        Ok(self.state()?.rules.get(id).cloned())
    }

    fn rules(&self, filter: &RuleFilter) -> Result<Vec<ValidationRule>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .rules
            .values()
            .filter(|rule| filter.matches(rule))
            .cloned()
            .collect())
    }

    fn update_rule(&self, rule: ValidationRule) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.rules.get_mut(&rule.id) {
            Some(existing) => {
                *existing = rule;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn delete_rule(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state
            .rules
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn active_rules(
        &self,
        requirement_id: &RequirementId,
        asset_type: AssetType,
    ) -> Result<Vec<ValidationRule>, RepositoryError> {
        let state = self.state()?;
        let mut rules: Vec<ValidationRule> = state
            .rules
            .values()
            .filter(|rule| {
                rule.is_active
                    && rule.asset_type == asset_type
                    && rule.requirement_id == *requirement_id
            })
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    fn mapping(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<AssetRequirementMapping>, RepositoryError> {
        let key = MappingKey {
            asset_type,
            asset_id: asset_id.clone(),
            requirement_id: requirement_id.clone(),
        };
        Ok(self.state()?.mappings.get(&key).cloned())
    }

    fn mappings_for_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .mappings
            .values()
            .filter(|mapping| mapping.asset_type == asset_type && mapping.asset_id == *asset_id)
            .cloned()
            .collect())
    }

    fn all_mappings(
        &self,
        asset_type: Option<AssetType>,
    ) -> Result<Vec<AssetRequirementMapping>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .mappings
            .values()
            .filter(|mapping| asset_type.map_or(true, |kind| kind == mapping.asset_type))
            .cloned()
            .collect())
    }

    fn record_assessment(
        &self,
        write: AssessmentWrite,
    ) -> Result<ComplianceAssessment, RepositoryError> {
        let mut state = self.state()?;
        let key = write.mapping.key();
        let (mapping, assessment) = write.resolve(state.mappings.get(&key));
        state.mappings.insert(key, mapping);
        state.history.push(assessment.clone());
        Ok(assessment)
    }

    fn assessments(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Vec<ComplianceAssessment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .history
            .iter()
            .filter(|assessment| same_pair(assessment, asset_type, asset_id, requirement_id))
            .cloned()
            .collect())
    }

    fn latest_assessment(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
        requirement_id: &RequirementId,
    ) -> Result<Option<ComplianceAssessment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .history
            .iter()
            .rev()
            .find(|assessment| same_pair(assessment, asset_type, asset_id, requirement_id))
            .cloned())
    }
}

/// Asset directory over a fixed set of records, keyed by type and id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAssetDirectory {
    assets: Arc<Mutex<BTreeMap<(AssetType, AssetId), AssetRecord>>>,
}

impl InMemoryAssetDirectory {
    pub fn with_assets<I>(assets: I) -> Self
    where
        I: IntoIterator<Item = AssetRecord>,
    {
        let directory = Self::default();
        for asset in assets {
            directory.upsert(asset);
        }
        directory
    }

    pub fn upsert(&self, asset: AssetRecord) {
        if let Ok(mut assets) = self.assets.lock() {
            assets.insert((asset.asset_type, asset.asset_id.clone()), asset);
        }
    }
}

impl AssetDirectory for InMemoryAssetDirectory {
    fn get_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetRecord, AssetLookupError> {
        let assets = self
            .assets
            .lock()
            .map_err(|_| AssetLookupError::Unavailable("directory mutex poisoned".to_string()))?;
        assets
            .get(&(asset_type, asset_id.clone()))
            .cloned()
            .ok_or_else(|| AssetLookupError::NotFound {
                asset_type,
                asset_id: asset_id.clone(),
            })
    }

    fn describe_asset(&self, asset_type: AssetType, asset_id: &AssetId) -> Option<AssetProfile> {
        let assets = self.assets.lock().ok()?;
        assets
            .get(&(asset_type, asset_id.clone()))
            .map(AssetRecord::profile)
    }
}
