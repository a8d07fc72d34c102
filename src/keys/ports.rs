use std::path::Path;

use crate::{error::PipelineError, keys::types::KeysRecord};

/// Maps the rows of a model exposures file to peril and vulnerability ids.
///
/// Rows that cannot be resolved come back as non-matching records rather than
/// as an error; an `Err` means the service itself failed.
pub trait KeysLookupService: Send + Sync {
    fn name(&self) -> &str;

    fn get_keys(&self, model_exposures_file: &Path) -> Result<Vec<KeysRecord>, PipelineError>;
}
