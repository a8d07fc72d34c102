use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, cancelled, io_error, transformation_error},
    transforms::ports::ExposureTransform,
};

/// Copies the rows unchanged, rejecting input that is not well-formed CSV.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransform;

impl ExposureTransform for PassthroughTransform {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        let mut reader = csv::Reader::from_path(input).map_err(|err| {
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

        let mut writer = csv::Writer::from_path(output).map_err(|err| {
            io_error(format!("failed to create '{}': {err}", output.display()))
        })?;
        writer
            .write_record(&headers)
            .map_err(|err| io_error(format!("failed to write '{}': {err}", output.display())))?;

        let mut rows = 0_u64;
        for record in reader.records() {
            if cancel.is_cancelled() {
                return Err(cancelled(format!(
                    "passthrough of '{}' cancelled",
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
            writer.write_record(&record).map_err(|err| {
                io_error(format!("failed to write '{}': {err}", output.display()))
            })?;
            rows += 1;
        }

        writer
            .flush()
            .map_err(|err| io_error(format!("failed to flush '{}': {err}", output.display())))?;
        Ok(rows)
    }
}
