use oasis_pipeline::{exposures::GenerateOverrides, files::PipelineSlot};

use crate::support::{CountingLookup, Workspace, key, piwind_model};

#[test]
fn given_completed_pipeline_when_generating_again_then_nothing_is_rerun() {
    let workspace = Workspace::new("idempotence");
    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let first = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    let second = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("second run should complete");

    assert!(second.executed.is_empty(), "executed: {:?}", second.executed);
    assert_eq!(second.skipped.len(), 6);
    assert_eq!(lookup.calls(), 1);
    assert_eq!(second.files_pipeline, first.files_pipeline);
    assert_eq!(second.keys, first.keys);
}

#[test]
fn given_completed_pipeline_when_forced_then_every_stage_reruns() {
    let workspace = Workspace::new("idempotence-force");
    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    let forced = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::forced())
        .expect("forced run should complete");

    assert_eq!(forced.executed.len(), 6);
    assert!(forced.skipped.is_empty());
    assert_eq!(lookup.calls(), 2);
    assert_eq!(forced.unmatched(), 1);
}

#[test]
fn given_deleted_output_when_generating_again_then_only_that_stage_reruns() {
    let workspace = Workspace::new("idempotence-missing");
    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let first = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("first run should complete");
    let coverages = first
        .files_pipeline
        .slot(PipelineSlot::Coverages)
        .expect("coverages slot")
        .to_path_buf();
    std::fs::remove_file(&coverages).expect("coverages should be removable");

    let second = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("second run should complete");
    assert_eq!(second.executed, vec![PipelineSlot::Coverages]);
    assert_eq!(lookup.calls(), 1);
    assert!(coverages.is_file());
}
