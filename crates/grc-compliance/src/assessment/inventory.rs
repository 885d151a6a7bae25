//! CSV asset inventories for offline rule evaluation.
//!
//! Each row is one asset. The `id` column is required; dotted headers such as
//! `encryption.atRest` build nested records. Empty cells are left out of the
//! record so that `exists` checks see them as missing.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;

use super::domain::{AssetId, AssetProfile, AssetRecord, AssetType, FieldValue};
use super::repository::{AssetDirectory, AssetLookupError};

const ID_COLUMN: &str = "id";

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("failed to read asset inventory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid asset inventory CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("asset inventory is missing the 'id' column")]
    MissingIdColumn,
    #[error("row on line {line} has an empty asset id")]
    MissingAssetId { line: u64 },
    #[error("asset {0} appears more than once")]
    DuplicateAsset(AssetId),
    #[error("column '{0}' collides with a nested column of the same prefix")]
    ConflictingColumn(String),
    #[error("column '{column}' on line {line} holds invalid JSON: {source}")]
    InvalidJson {
        column: String,
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Asset records of a single asset type loaded from CSV.
#[derive(Debug, Clone)]
pub struct CsvAssetInventory {
    asset_type: AssetType,
    assets: BTreeMap<AssetId, AssetRecord>,
}

impl CsvAssetInventory {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        asset_type: AssetType,
    ) -> Result<Self, InventoryError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, asset_type)
    }

    pub fn from_reader<R: Read>(reader: R, asset_type: AssetType) -> Result<Self, InventoryError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let id_index = headers
            .iter()
            .position(|header| header == ID_COLUMN)
            .ok_or(InventoryError::MissingIdColumn)?;

        let mut assets = BTreeMap::new();
        for row in csv_reader.records() {
            let row = row?;
            let line = row.position().map(|position| position.line()).unwrap_or(0);

            let id = row.get(id_index).unwrap_or_default();
            if id.is_empty() {
                return Err(InventoryError::MissingAssetId { line });
            }
            let asset_id = AssetId::new(id);

            let mut fields = BTreeMap::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if cell.is_empty() {
                    continue;
                }
                let value = parse_cell(cell).map_err(|source| InventoryError::InvalidJson {
                    column: header.to_string(),
                    line,
                    source,
                })?;
                insert_path(&mut fields, header, value)?;
            }

            let record = AssetRecord {
                asset_type,
                asset_id: asset_id.clone(),
                fields,
            };
            if assets.insert(asset_id.clone(), record).is_some() {
                return Err(InventoryError::DuplicateAsset(asset_id));
            }
        }

        Ok(Self { asset_type, assets })
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetDirectory for CsvAssetInventory {
    fn get_asset(
        &self,
        asset_type: AssetType,
        asset_id: &AssetId,
    ) -> Result<AssetRecord, AssetLookupError> {
        self.assets
            .get(asset_id)
            .filter(|_| asset_type == self.asset_type)
            .cloned()
            .ok_or_else(|| AssetLookupError::NotFound {
                asset_type,
                asset_id: asset_id.clone(),
            })
    }

    fn describe_asset(&self, asset_type: AssetType, asset_id: &AssetId) -> Option<AssetProfile> {
        if asset_type != self.asset_type {
            return None;
        }
        self.assets.get(asset_id).map(AssetRecord::profile)
    }
}

fn parse_cell(raw: &str) -> Result<FieldValue, serde_json::Error> {
    if raw.starts_with('[') || raw.starts_with('{') {
        return serde_json::from_str(raw);
    }

    if raw.eq_ignore_ascii_case("true") {
        return Ok(FieldValue::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Ok(FieldValue::Bool(false));
    }

    if let Some(number) = raw.parse::<f64>().ok().filter(|number| number.is_finite()) {
        return Ok(FieldValue::Number(number));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(FieldValue::Date(date));
    }

    Ok(FieldValue::text(raw))
}

fn insert_path(
    fields: &mut BTreeMap<String, FieldValue>,
    path: &str,
    value: FieldValue,
) -> Result<(), InventoryError> {
    match path.split_once('.') {
        None => {
            if matches!(fields.get(path), Some(FieldValue::Record(_))) {
                return Err(InventoryError::ConflictingColumn(path.to_string()));
            }
            fields.insert(path.to_string(), value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = fields
                .entry(head.to_string())
                .or_insert_with(|| FieldValue::Record(BTreeMap::new()));
            match child {
                FieldValue::Record(children) => insert_path(children, rest, value),
                _ => Err(InventoryError::ConflictingColumn(path.to_string())),
            }
        }
    }
}
