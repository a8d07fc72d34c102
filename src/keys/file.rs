use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, cancelled, io_error, transformation_error},
    keys::types::{KeysRecord, KeysSummary},
};

pub const KEYS_FILE_HEADER: [&str; 7] = [
    "LocID",
    "PerilID",
    "CoverageID",
    "AreaPerilID",
    "VulnerabilityID",
    "Status",
    "Message",
];

pub fn write_keys_file(
    path: &Path,
    records: &[KeysRecord],
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| io_error(format!("failed to create '{}': {err}", path.display())))?;
    writer
        .write_record(KEYS_FILE_HEADER)
        .map_err(|err| io_error(format!("failed to write '{}': {err}", path.display())))?;

    for record in records {
        if cancel.is_cancelled() {
            return Err(cancelled(format!(
                "writing keys file '{}' cancelled",
                path.display()
            )));
        }
        writer
            .serialize(record)
            .map_err(|err| io_error(format!("failed to write '{}': {err}", path.display())))?;
    }

    writer
        .flush()
        .map_err(|err| io_error(format!("failed to flush '{}': {err}", path.display())))
}

pub fn read_keys_file(path: &Path) -> Result<Vec<KeysRecord>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|err| {
            transformation_error(format!("failed to open keys file '{}': {err}", path.display()))
        })?;

    reader
        .deserialize::<KeysRecord>()
        .enumerate()
        .map(|(index, record)| {
            record.map_err(|err| {
                transformation_error(format!(
                    "malformed keys record {} in '{}': {err}",
                    index + 1,
                    path.display()
                ))
            })
        })
        .collect()
}

pub fn summarize_keys_file(path: &Path) -> Result<KeysSummary, PipelineError> {
    Ok(KeysSummary::from_records(&read_keys_file(path)?))
}
