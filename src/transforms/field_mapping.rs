use std::{collections::BTreeSet, path::Path};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, cancelled, io_error, transformation_error},
    transforms::ports::ExposureTransform,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    pub from: String,
    pub to: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Renames and selects columns. Source columns are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMappingTransform {
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    /// Carry input columns that no mapping consumes, after the mapped ones.
    #[serde(default)]
    pub keep_unmapped: bool,
    /// Prepends a 1-based row number column with this name.
    #[serde(default)]
    pub sequence_column: Option<String>,
}

enum Cell {
    Input(usize),
    Blank,
}

impl FieldMappingTransform {
    fn plan(&self, headers: &csv::StringRecord) -> Result<(Vec<String>, Vec<Cell>), PipelineError> {
        let find = |name: &str| headers.iter().position(|header| header.eq_ignore_ascii_case(name));

        let mut out_headers = Vec::new();
        let mut cells = Vec::new();
        let mut consumed = BTreeSet::new();
        for field in &self.fields {
            match find(&field.from) {
                Some(index) => {
                    consumed.insert(index);
                    cells.push(Cell::Input(index));
                }
                None if field.required => {
                    return Err(transformation_error(format!(
                        "required column '{}' is missing from the input",
                        field.from
                    )));
                }
                None => cells.push(Cell::Blank),
            }
            out_headers.push(field.to.clone());
        }

        if self.keep_unmapped {
            for (index, header) in headers.iter().enumerate() {
                if !consumed.contains(&index) {
                    out_headers.push(header.to_string());
                    cells.push(Cell::Input(index));
                }
            }
        }

        if let Some(sequence_column) = &self.sequence_column {
            if out_headers
                .iter()
                .any(|header| header.eq_ignore_ascii_case(sequence_column))
            {
                return Err(transformation_error(format!(
                    "sequence column '{sequence_column}' collides with a mapped column"
                )));
            }
            out_headers.insert(0, sequence_column.clone());
        }

        if out_headers.is_empty() {
            return Err(transformation_error("field mapping produces no columns"));
        }

        Ok((out_headers, cells))
    }
}

impl ExposureTransform for FieldMappingTransform {
    fn name(&self) -> &str {
        "field-mapping"
    }

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(input)
            .map_err(|err| {
                transformation_error(format!("failed to open '{}': {err}", input.display()))
            })?;
        let headers = reader
            .headers()
            .map_err(|err| {
                transformation_error(format!(
                    "failed to read header of '{}': {err}",
                    input.display()
                ))
            })?
            .clone();
        let (out_headers, cells) = self.plan(&headers)?;

        let mut writer = csv::Writer::from_path(output).map_err(|err| {
            io_error(format!("failed to create '{}': {err}", output.display()))
        })?;
        writer
            .write_record(&out_headers)
            .map_err(|err| io_error(format!("failed to write '{}': {err}", output.display())))?;

        let mut rows = 0_u64;
        let mut out_row = Vec::with_capacity(out_headers.len());
        for record in reader.records() {
            if cancel.is_cancelled() {
                return Err(cancelled(format!(
                    "field mapping of '{}' cancelled",
                    input.display()
                )));
            }
            let record = record.map_err(|err| {
                transformation_error(format!(
                    "malformed row {} in '{}': {err}",
                    rows + 1,
                    input.display()
                ))
            })?;

            rows += 1;
            out_row.clear();
            if self.sequence_column.is_some() {
                out_row.push(rows.to_string());
            }
            for cell in &cells {
                out_row.push(match cell {
                    Cell::Input(index) => record.get(*index).unwrap_or_default().to_string(),
                    Cell::Blank => String::new(),
                });
            }
            writer.write_record(&out_row).map_err(|err| {
                io_error(format!("failed to write '{}': {err}", output.display()))
            })?;
        }

        writer
            .flush()
            .map_err(|err| io_error(format!("failed to flush '{}': {err}", output.display())))?;
        Ok(rows)
    }
}
