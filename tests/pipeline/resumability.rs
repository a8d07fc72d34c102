use std::{fs, sync::Arc};

use oasis_pipeline::{
    error::PipelineErrorKind,
    exposures::GenerateOverrides,
    files::{PipelineSlot, PipelineStage},
    model::{
        ResourceValue,
        resources::{KEYS_LOOKUP, SOURCE_EXPOSURES_FILE_PATH},
    },
};

use crate::support::{
    CountingLookup, UnavailableLookup, Workspace, data_rows, key, lookup_resource, piwind_model,
    temp_files,
};

#[test]
fn given_saved_pipeline_when_restored_by_a_new_manager_then_completed_stages_are_not_rerun() {
    let workspace = Workspace::new("resume-restore");
    let first_manager = workspace.manager();
    first_manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");
    let first = first_manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    let state_path = first_manager.save_state(&key("1")).expect("state should save");
    assert!(state_path.is_file());
    assert!(state_path.starts_with(workspace.root.join("state")));

    let second_manager = workspace.manager();
    let lookup = CountingLookup::new();
    second_manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");
    assert!(second_manager.restore_state(&key("1")).expect("restore"));

    let resumed = second_manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("resumed run should complete");
    assert!(resumed.executed.is_empty());
    assert_eq!(lookup.calls(), 0);
    assert_eq!(resumed.files_pipeline, first.files_pipeline);
}

#[test]
fn given_saved_pipeline_when_source_path_changed_before_restore_then_every_stage_reruns_from_new_source()
 {
    let workspace = Workspace::new("resume-new-source");
    let first_manager = workspace.manager();
    first_manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");
    first_manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    first_manager.save_state(&key("1")).expect("state should save");

    let new_source = workspace.write(
        "NewSourceLoc.csv",
        "LocNumber,PostalCode,OccupancyCode,BuildingTIV\nL0009,AB1 2CD,1050,310000\n",
    );
    let second_manager = workspace.manager();
    let lookup = CountingLookup::new();
    let mut model = piwind_model(&workspace, "1", lookup.clone());
    model.set_resource(
        SOURCE_EXPOSURES_FILE_PATH,
        ResourceValue::Path(new_source.clone()),
    );
    second_manager.add_model(model).expect("model should be added");
    assert!(second_manager.restore_state(&key("1")).expect("restore"));

    let rerun = second_manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("rerun should complete");
    assert_eq!(rerun.executed.len(), 6);
    assert_eq!(lookup.calls(), 1);
    assert_eq!(
        rerun.files_pipeline.slot(PipelineSlot::SourceExposures),
        Some(new_source.as_path())
    );
    let items = rerun.files_pipeline.slot(PipelineSlot::Items).expect("items slot");
    assert_eq!(data_rows(items), 1);
}

#[test]
fn given_no_saved_state_when_restoring_then_nothing_is_restored() {
    let workspace = Workspace::new("resume-none");
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");
    assert!(!manager.restore_state(&key("1")).expect("restore"));
}

#[test]
fn given_failing_lookup_when_generating_then_slots_stop_at_last_success_and_rerun_resumes() {
    let workspace = Workspace::new("resume-failure");
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(&workspace, "1", Arc::new(UnavailableLookup)))
        .expect("model should be added");

    let err = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect_err("lookup is unavailable");
    assert_eq!(err.kind, PipelineErrorKind::LookupService);
    assert_eq!(err.slot, Some(PipelineSlot::Keys));

    let shared = manager.model(&key("1")).expect("model registered");
    let model_exposures = {
        let model = shared.lock().expect("model lock");
        let pipeline = model.files_pipeline();
        assert_eq!(pipeline.stage(), PipelineStage::ModelExposures);
        assert!(pipeline.slot(PipelineSlot::Keys).is_none());
        assert!(temp_files(&manager.output_dir(&model)).is_empty());
        pipeline
            .slot(PipelineSlot::ModelExposures)
            .map(|path| path.to_path_buf())
    };

    let lookup = CountingLookup::new();
    let mut overrides = GenerateOverrides::default();
    overrides
        .resources
        .insert(KEYS_LOOKUP.to_string(), lookup_resource(lookup.clone()));
    let resumed = manager
        .generate_oasis_files_for(&key("1"), overrides)
        .expect("resumed run should complete");

    assert_eq!(
        resumed.executed,
        vec![
            PipelineSlot::Keys,
            PipelineSlot::Items,
            PipelineSlot::Coverages,
            PipelineSlot::GulSummaryXref,
        ]
    );
    assert_eq!(lookup.calls(), 1);
    assert_eq!(
        resumed
            .files_pipeline
            .slot(PipelineSlot::ModelExposures)
            .map(|path| path.to_path_buf()),
        model_exposures
    );
}

#[test]
fn given_completed_pipeline_when_started_again_then_every_stage_reruns_from_a_staged_source_copy() {
    let workspace = Workspace::new("resume-start");
    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let first = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    let restarted = manager
        .start_files_pipeline_for(&key("1"), GenerateOverrides::default())
        .expect("restart should complete");

    assert_eq!(restarted.executed.len(), 6);
    assert_eq!(lookup.calls(), 2);
    assert_eq!(restarted.files_pipeline.stage(), PipelineStage::Complete);

    let original = first
        .files_pipeline
        .slot(PipelineSlot::SourceExposures)
        .expect("source slot");
    let staged = workspace
        .root
        .join("Files")
        .join("OasisLMF-PiWind-1")
        .join("SourceLoc-1.csv");
    assert_eq!(
        restarted.files_pipeline.slot(PipelineSlot::SourceExposures),
        Some(staged.as_path())
    );
    assert_eq!(
        fs::read_to_string(&staged).expect("staged copy readable"),
        fs::read_to_string(original).expect("source readable")
    );

    let again = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("later run should complete");
    assert!(again.executed.is_empty(), "executed: {:?}", again.executed);
    assert_eq!(again.files_pipeline, restarted.files_pipeline);
}

#[test]
fn given_deleted_model_when_looked_up_then_it_is_gone_and_its_pipeline_cleared() {
    let workspace = Workspace::new("resume-delete");
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");
    manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("run should complete");

    let removed = manager
        .delete_model(&key("1"))
        .expect("delete should succeed")
        .expect("model was registered");
    assert!(removed.lock().expect("model lock").files_pipeline().is_empty());
    assert!(manager.model(&key("1")).is_none());
    assert!(manager.models().is_empty());
}
