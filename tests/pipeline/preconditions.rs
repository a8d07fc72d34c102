use std::fs;

use oasis_pipeline::{
    error::PipelineErrorKind,
    exposures::{ExposuresManagerPort, GenerateOverrides},
    files::{PipelineSlot, PipelineStage},
    model::{Model, resources::SOURCE_EXPOSURES_FILE_PATH},
};

use crate::support::{CountingLookup, Workspace, key, piwind_model};

#[test]
fn given_no_canonical_exposures_when_transforming_to_model_then_transformation_error_and_no_output()
 {
    let workspace = Workspace::new("preconditions");
    let manager = workspace.manager();
    let shared = manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");

    let mut model = shared.lock().expect("model lock");
    let err = manager
        .transform_canonical_to_model(&mut model, false)
        .expect_err("canonical exposures are missing");
    assert_eq!(err.kind, PipelineErrorKind::Transformation);
    assert_eq!(err.slot, Some(PipelineSlot::ModelExposures));
    assert_eq!(model.files_pipeline().stage(), PipelineStage::SourceLoaded);

    let output_dir = manager.output_dir(&model);
    let entries = fs::read_dir(&output_dir)
        .expect("output dir exists")
        .count();
    assert_eq!(entries, 0, "nothing may be written to {}", output_dir.display());
}

#[test]
fn given_missing_source_file_when_generating_then_canonical_stage_fails() {
    let workspace = Workspace::new("preconditions-source");
    let manager = workspace.manager();
    let mut model = piwind_model(&workspace, "1", CountingLookup::new());
    model.set_resource(
        SOURCE_EXPOSURES_FILE_PATH,
        oasis_pipeline::model::ResourceValue::Path(workspace.root.join("absent.csv")),
    );
    manager.add_model(model).expect("model should be added");

    let err = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect_err("source file is missing");
    assert_eq!(err.kind, PipelineErrorKind::Transformation);
    assert_eq!(err.slot, Some(PipelineSlot::CanonicalExposures));
}

#[test]
fn given_model_without_keys_lookup_when_generating_then_configuration_error_at_keys() {
    let workspace = Workspace::new("preconditions-lookup");
    let manager = workspace.manager();
    let mut model = piwind_model(&workspace, "1", CountingLookup::new());
    model.remove_resource("keys_lookup");
    manager.add_model(model).expect("model should be added");

    let err = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect_err("keys lookup is not configured");
    assert_eq!(err.kind, PipelineErrorKind::Configuration);
    assert_eq!(err.slot, Some(PipelineSlot::Keys));

    let shared = manager.model(&key("1")).expect("model registered");
    let model: std::sync::MutexGuard<'_, Model> = shared.lock().expect("model lock");
    assert_eq!(model.files_pipeline().stage(), PipelineStage::ModelExposures);
}
