use std::{collections::HashMap, path::Path};

use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, cancelled, io_error, transformation_error},
    exposures::profile::CanonicalProfile,
    files::{ExposureTable, PipelineSlot},
    keys::KeysRecord,
};

pub const ITEMS_FILE_NAME: &str = "items.csv";
pub const COVERAGES_FILE_NAME: &str = "coverages.csv";
pub const GULSUMMARYXREF_FILE_NAME: &str = "gulsummaryxref.csv";

const SUMMARY_ID: u64 = 1;
const SUMMARYSET_ID: u64 = 1;

/// One insured coverage; `item_id` doubles as coverage and group id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OasisRow {
    pub item_id: u64,
    pub areaperil_id: u64,
    pub vulnerability_id: u64,
    pub tiv: f64,
}

pub fn file_name(slot: PipelineSlot) -> Option<&'static str> {
    match slot {
        PipelineSlot::Items => Some(ITEMS_FILE_NAME),
        PipelineSlot::Coverages => Some(COVERAGES_FILE_NAME),
        PipelineSlot::GulSummaryXref => Some(GULSUMMARYXREF_FILE_NAME),
        _ => None,
    }
}

/// Name of the per-run copy kept next to the fixed-name Oasis file,
/// e.g. `items-20240131120000.csv`.
pub fn timestamped_file_name(slot: PipelineSlot, timestamp: &str) -> Option<String> {
    file_name(slot)
        .and_then(|name| name.strip_suffix(".csv"))
        .map(|stem| format!("{stem}-{timestamp}.csv"))
}

/// Joins matched keys to their exposure rows and keeps coverages with a
/// positive TIV, numbering them in keys file order.
pub fn build_oasis_rows(
    keys: &[KeysRecord],
    exposures: &ExposureTable,
    id_column: &str,
    profile: &CanonicalProfile,
    cancel: &CancellationToken,
) -> Result<Vec<OasisRow>, PipelineError> {
    let id_index = exposures.require_column(id_column)?;
    let mut rows_by_id: HashMap<&str, Vec<usize>> = HashMap::new();
    for row in 0..exposures.len() {
        let id = exposures.cell(row, id_index).unwrap_or_default();
        rows_by_id.entry(id).or_default().push(row);
    }

    let tiv_columns = profile.tiv_columns();
    let mut rows = Vec::new();
    for record in keys.iter().filter(|record| record.is_match()) {
        if cancel.is_cancelled() {
            return Err(cancelled("building Oasis rows cancelled"));
        }

        let row = match rows_by_id.get(record.loc_id.as_str()).map(Vec::as_slice) {
            Some([row]) => *row,
            Some([]) | None => {
                return Err(transformation_error(format!(
                    "no exposure row with {id_column} '{}' for keys record",
                    record.loc_id
                )));
            }
            Some(_) => {
                return Err(transformation_error(format!(
                    "duplicate exposure rows with {id_column} '{}'",
                    record.loc_id
                )));
            }
        };

        let tiv_column = tiv_columns.get(&record.coverage_type).ok_or_else(|| {
            transformation_error(format!(
                "canonical profile has no TIV field for coverage type {}",
                record.coverage_type
            ))
        })?;
        let tiv = parse_tiv(exposures, row, tiv_column)?;
        if tiv <= 0.0 {
            continue;
        }

        let (Some(areaperil_id), Some(vulnerability_id)) =
            (record.area_peril_id, record.vulnerability_id)
        else {
            return Err(transformation_error(format!(
                "matched keys record for '{}' lacks area peril or vulnerability id",
                record.loc_id
            )));
        };

        rows.push(OasisRow {
            item_id: rows.len() as u64 + 1,
            areaperil_id,
            vulnerability_id,
            tiv,
        });
    }

    Ok(rows)
}

fn parse_tiv(exposures: &ExposureTable, row: usize, column: &str) -> Result<f64, PipelineError> {
    let index = exposures.require_column(column)?;
    let raw = exposures.cell(row, index).unwrap_or_default();
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(tiv) if tiv.is_finite() => Ok(tiv),
        _ => Err(transformation_error(format!(
            "{column} value '{raw}' is not a finite number"
        ))),
    }
}

pub fn write_oasis_file(
    slot: PipelineSlot,
    path: &Path,
    rows: &[OasisRow],
) -> Result<u64, PipelineError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|err| io_error(format!("failed to create '{}': {err}", path.display())))?;
    let write_err =
        |err: csv::Error| io_error(format!("failed to write '{}': {err}", path.display()));

    match slot {
        PipelineSlot::Items => {
            writer
                .write_record([
                    "item_id",
                    "coverage_id",
                    "areaperil_id",
                    "vulnerability_id",
                    "group_id",
                ])
                .map_err(write_err)?;
            for row in rows {
                let id = row.item_id.to_string();
                writer
                    .write_record([
                        id.clone(),
                        id.clone(),
                        row.areaperil_id.to_string(),
                        row.vulnerability_id.to_string(),
                        id,
                    ])
                    .map_err(write_err)?;
            }
        }
        PipelineSlot::Coverages => {
            writer
                .write_record(["coverage_id", "tiv"])
                .map_err(write_err)?;
            for row in rows {
                writer
                    .write_record([row.item_id.to_string(), format!("{:.5}", row.tiv)])
                    .map_err(write_err)?;
            }
        }
        PipelineSlot::GulSummaryXref => {
            writer
                .write_record(["coverage_id", "summary_id", "summaryset_id"])
                .map_err(write_err)?;
            for row in rows {
                writer
                    .write_record([
                        row.item_id.to_string(),
                        SUMMARY_ID.to_string(),
                        SUMMARYSET_ID.to_string(),
                    ])
                    .map_err(write_err)?;
            }
        }
        other => {
            return Err(transformation_error(format!("{other} is not an Oasis file")));
        }
    }

    writer
        .flush()
        .map_err(|err| io_error(format!("failed to flush '{}': {err}", path.display())))?;
    Ok(rows.len() as u64)
}
