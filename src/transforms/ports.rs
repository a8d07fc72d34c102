use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Rewrites one exposure file into another representation.
///
/// `output` is a scratch path owned by the caller; implementations write the
/// whole result there and return the number of data rows written. They should
/// poll `cancel` between rows and bail out with a `Cancelled` error.
pub trait ExposureTransform: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError>;
}
