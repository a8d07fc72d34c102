use std::path::Path;

use crate::error::{PipelineError, io_error, transformation_error};

/// An exposure file held in memory as a header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExposureTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|err| {
                transformation_error(format!(
                    "failed to open exposure file '{}': {err}",
                    path.display()
                ))
            })?;

        let headers = reader
            .headers()
            .map_err(|err| {
                transformation_error(format!(
                    "failed to read header of '{}': {err}",
                    path.display()
                ))
            })?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        if headers.iter().all(String::is_empty) {
            return Err(transformation_error(format!(
                "exposure file '{}' has no header row",
                path.display()
            )));
        }

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|err| {
                transformation_error(format!(
                    "malformed row {} in '{}': {err}",
                    index + 1,
                    path.display()
                ))
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        let mut writer = csv::Writer::from_path(path).map_err(|err| {
            io_error(format!("failed to create '{}': {err}", path.display()))
        })?;
        writer.write_record(&self.headers).map_err(|err| {
            io_error(format!("failed to write header of '{}': {err}", path.display()))
        })?;
        for row in &self.rows {
            writer.write_record(row).map_err(|err| {
                io_error(format!("failed to write row to '{}': {err}", path.display()))
            })?;
        }
        writer
            .flush()
            .map_err(|err| io_error(format!("failed to flush '{}': {err}", path.display())))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Case-insensitive header lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    }

    pub fn require_column(&self, name: &str) -> Result<usize, PipelineError> {
        self.column_index(name).ok_or_else(|| {
            transformation_error(format!("exposure file has no '{name}' column"))
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
    }
}
