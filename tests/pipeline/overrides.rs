use std::fs;

use oasis_pipeline::{
    error::PipelineErrorKind,
    exposures::GenerateOverrides,
    files::{PipelineSlot, PipelineStage},
    model::{Model, resources::SOURCE_EXPOSURES_FILE_PATH},
};

use crate::support::{CountingLookup, Workspace, key, piwind_model};

/// Runs a full pipeline and copies its outputs out of the manager's tree.
fn produced_files(workspace: &Workspace) -> GenerateOverrides {
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(workspace, "seed", CountingLookup::new()))
        .expect("model should be added");
    let report = manager
        .generate_oasis_files_for(&key("seed"), GenerateOverrides::default())
        .expect("seed run should complete");

    let supplied = workspace.root.join("supplied");
    fs::create_dir_all(&supplied).expect("supplied dir");
    let mut overrides = GenerateOverrides::default();
    for slot in PipelineSlot::ALL {
        let original = report.files_pipeline.slot(slot).expect("slot populated");
        let copy = supplied.join(original.file_name().expect("file name"));
        fs::copy(original, &copy).expect("copy output");
        overrides = overrides.with_file(slot, copy);
    }
    overrides
}

#[test]
fn given_every_file_supplied_when_generating_then_pipeline_completes_without_running_stages() {
    let workspace = Workspace::new("overrides-all");
    let overrides = produced_files(&workspace);
    let manager = workspace.manager();
    manager
        .add_model(Model::create("OasisLMF", "PiWind", "bare", None).expect("valid model"))
        .expect("model should be added");

    let report = manager
        .generate_oasis_files_for(&key("bare"), overrides.clone())
        .expect("supplied files should be adopted");

    assert!(report.executed.is_empty());
    assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
    assert_eq!(report.unmatched(), 1);
    for (slot, path) in &overrides.files {
        assert_eq!(report.files_pipeline.slot(*slot), Some(path.as_path()));
    }
}

#[test]
fn given_model_exposures_and_keys_without_source_when_generating_then_only_oasis_files_are_built() {
    let workspace = Workspace::new("overrides-no-source");
    let produced = produced_files(&workspace);
    let overrides = GenerateOverrides::default()
        .with_file(
            PipelineSlot::ModelExposures,
            produced.files[&PipelineSlot::ModelExposures].clone(),
        )
        .with_file(PipelineSlot::Keys, produced.files[&PipelineSlot::Keys].clone());

    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    let mut model = piwind_model(&workspace, "1", lookup.clone());
    model.remove_resource(SOURCE_EXPOSURES_FILE_PATH);
    manager.add_model(model).expect("model should be added");

    let report = manager
        .generate_oasis_files_for(&key("1"), overrides)
        .expect("supplied upstream files should be enough");

    assert_eq!(
        report.executed,
        vec![
            PipelineSlot::Items,
            PipelineSlot::Coverages,
            PipelineSlot::GulSummaryXref,
        ]
    );
    assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
    assert!(report.files_pipeline.slot(PipelineSlot::SourceExposures).is_none());
    assert!(report.files_pipeline.slot(PipelineSlot::CanonicalExposures).is_none());
    assert_eq!(report.unmatched(), 1);
    assert_eq!(lookup.calls(), 0);
}

#[test]
fn given_missing_override_file_when_generating_then_transformation_error_names_the_slot() {
    let workspace = Workspace::new("overrides-missing");
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");

    let overrides = GenerateOverrides::default()
        .with_file(PipelineSlot::Keys, workspace.root.join("no-such-keys.csv"));
    let err = manager
        .generate_oasis_files_for(&key("1"), overrides)
        .expect_err("missing override must fail");
    assert_eq!(err.kind, PipelineErrorKind::Transformation);
    assert_eq!(err.slot, Some(PipelineSlot::Keys));
}

#[test]
fn given_supplied_keys_file_when_generating_then_lookup_is_not_called() {
    let workspace = Workspace::new("overrides-keys");
    let overrides = produced_files(&workspace);
    let keys = overrides.files[&PipelineSlot::Keys].clone();

    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let report = manager
        .generate_oasis_files_for(
            &key("1"),
            GenerateOverrides::default().with_file(PipelineSlot::Keys, keys),
        )
        .expect("pipeline should complete");
    assert_eq!(lookup.calls(), 0);
    assert!(report.skipped.contains(&PipelineSlot::Keys));
    assert!(report.executed.contains(&PipelineSlot::Items));
    assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
}
