use std::path::Path;

use crate::{
    error::PipelineError,
    exposures::{
        profile::CanonicalProfile,
        types::{GenerateOverrides, KeysReport, OasisFilesReport, StageOutcome},
    },
    model::Model,
};

/// Stage operations over a model's files pipeline.
///
/// Every stage skips when its output slot already points at a non-empty file,
/// unless `force` is set, and publishes its output atomically.
pub trait ExposuresManagerPort: Send + Sync {
    fn load_canonical_profile(&self, model: &mut Model) -> Result<CanonicalProfile, PipelineError>;

    fn transform_source_to_canonical(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError>;

    fn transform_canonical_to_model(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError>;

    fn get_keys(&self, model: &mut Model, force: bool) -> Result<KeysReport, PipelineError>;

    fn generate_items_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError>;

    fn generate_coverages_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError>;

    fn generate_gulsummaryxref_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError>;

    /// Runs every stage in order, stopping at the first failure with the
    /// pipeline left at the last completed stage.
    fn generate_oasis_files(
        &self,
        model: &mut Model,
        overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError>;

    fn clear_files_pipeline(&self, model: &mut Model);

    fn save_files_pipeline(&self, model: &Model, path: &Path) -> Result<(), PipelineError>;

    fn restore_files_pipeline(&self, model: &mut Model, path: &Path) -> Result<(), PipelineError>;

    /// Clears the pipeline, then runs it from the source exposures file.
    fn start_files_pipeline(
        &self,
        model: &mut Model,
        overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError>;
}
