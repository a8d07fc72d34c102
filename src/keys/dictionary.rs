use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
    error::{PipelineError, lookup_service_error},
    files::ExposureTable,
    keys::{
        ports::KeysLookupService,
        types::{KeysLookupStatus, KeysRecord},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDictionary {
    pub column: String,
    pub values: BTreeMap<String, u64>,
}

impl ColumnDictionary {
    fn resolve(&self, table: &ExposureTable, row: usize, column: usize) -> Result<u64, String> {
        let value = table.cell(row, column).unwrap_or_default();
        self.values
            .get(value)
            .copied()
            .ok_or_else(|| format!("no match for {} '{value}'", self.column))
    }
}

/// Lookup settings of the built-in `dictionary` service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryLookupConfig {
    pub peril_id: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default)]
    pub coverage_column: Option<String>,
    #[serde(default = "default_coverage_types")]
    pub coverage_types: Vec<u32>,
    pub area_peril: ColumnDictionary,
    pub vulnerability: ColumnDictionary,
}

fn default_id_column() -> String {
    "ROW_ID".to_string()
}

fn default_coverage_types() -> Vec<u32> {
    vec![1]
}

/// Resolves keys from static value → id tables over exposure columns.
#[derive(Debug, Clone)]
pub struct DictionaryKeysLookup {
    config: DictionaryLookupConfig,
}

impl DictionaryKeysLookup {
    pub fn new(config: DictionaryLookupConfig) -> Result<Self, PipelineError> {
        if config.peril_id.trim().is_empty() {
            return Err(lookup_service_error("dictionary lookup needs a peril_id"));
        }
        if config.coverage_column.is_none() && config.coverage_types.is_empty() {
            return Err(lookup_service_error(
                "dictionary lookup needs coverage_column or coverage_types",
            ));
        }
        Ok(Self { config })
    }
}

impl KeysLookupService for DictionaryKeysLookup {
    fn name(&self) -> &str {
        "dictionary"
    }

    fn get_keys(&self, model_exposures_file: &Path) -> Result<Vec<KeysRecord>, PipelineError> {
        let table = ExposureTable::read(model_exposures_file)
            .map_err(|err| lookup_service_error(err.message))?;
        let column = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                lookup_service_error(format!(
                    "model exposures file '{}' has no '{name}' column",
                    model_exposures_file.display()
                ))
            })
        };
        let id_column = column(&self.config.id_column)?;
        let area_peril_column = column(&self.config.area_peril.column)?;
        let vulnerability_column = column(&self.config.vulnerability.column)?;
        let coverage_column = self
            .config
            .coverage_column
            .as_deref()
            .map(column)
            .transpose()?;

        let mut records = Vec::new();
        for row in 0..table.len() {
            let loc_id = table.cell(row, id_column).unwrap_or_default();

            let coverage_types = match coverage_column {
                Some(index) => {
                    let raw = table.cell(row, index).unwrap_or_default();
                    match raw.parse::<u32>() {
                        Ok(coverage_type) => vec![coverage_type],
                        Err(_) => {
                            records.push(KeysRecord {
                                loc_id: loc_id.to_string(),
                                peril_id: self.config.peril_id.clone(),
                                coverage_type: 0,
                                area_peril_id: None,
                                vulnerability_id: None,
                                status: KeysLookupStatus::Fail,
                                message: format!("invalid coverage type '{raw}'"),
                            });
                            continue;
                        }
                    }
                }
                None => self.config.coverage_types.clone(),
            };

            let area_peril = self.config.area_peril.resolve(&table, row, area_peril_column);
            let vulnerability = self
                .config
                .vulnerability
                .resolve(&table, row, vulnerability_column);

            for coverage_type in coverage_types {
                let record = match (&area_peril, &vulnerability) {
                    (Ok(area_peril_id), Ok(vulnerability_id)) => KeysRecord::matched(
                        loc_id,
                        &self.config.peril_id,
                        coverage_type,
                        *area_peril_id,
                        *vulnerability_id,
                    ),
                    (Err(message), _) | (_, Err(message)) => KeysRecord::unmatched(
                        loc_id,
                        &self.config.peril_id,
                        coverage_type,
                        message.clone(),
                    ),
                };
                records.push(record);
            }
        }

        Ok(records)
    }
}
