use std::{fs, path::Path};

use oasis_pipeline::{
    exposures::GenerateOverrides,
    files::{PipelineSlot, PipelineStage},
    keys::read_keys_file,
};

use crate::support::{CountingLookup, Workspace, data_rows, key, piwind_model, temp_files};

#[test]
fn given_three_locations_with_one_unknown_when_generating_then_pipeline_completes_with_one_unmatched()
 {
    let workspace = Workspace::new("scenario");
    let manager = workspace.manager();
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let report = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("pipeline should complete");

    assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
    assert_eq!(
        report.executed,
        vec![
            PipelineSlot::CanonicalExposures,
            PipelineSlot::ModelExposures,
            PipelineSlot::Keys,
            PipelineSlot::Items,
            PipelineSlot::Coverages,
            PipelineSlot::GulSummaryXref,
        ]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(report.unmatched(), 1);
    assert_eq!(report.keys.map(|summary| summary.matched), Some(2));
    assert_eq!(lookup.calls(), 1);

    let pipeline = &report.files_pipeline;
    let keys_path = pipeline.slot(PipelineSlot::Keys).expect("keys slot");
    let keys = read_keys_file(keys_path).expect("keys file should parse");
    assert_eq!(keys.len(), 3);
    assert_eq!(keys.iter().filter(|record| record.is_match()).count(), 2);

    let items = pipeline.slot(PipelineSlot::Items).expect("items slot");
    assert!(items.ends_with("items.csv"));
    assert_eq!(data_rows(items), 2);
    let coverages = pipeline.slot(PipelineSlot::Coverages).expect("coverages slot");
    let coverages_text = fs::read_to_string(coverages).expect("coverages readable");
    assert!(coverages_text.contains("220000.00000"));
    assert!(coverages_text.contains("480000.00000"));
    assert!(!coverages_text.contains("135000"));
    let xref = pipeline
        .slot(PipelineSlot::GulSummaryXref)
        .expect("xref slot");
    assert_eq!(data_rows(xref), 2);

    let output_dir = workspace.root.join("Files").join("OasisLMF-PiWind-1");
    assert!(temp_files(&output_dir).is_empty());

    for (stem, fixed) in [("items", items), ("coverages", coverages), ("gulsummaryxref", xref)] {
        let copies = timestamped_copies(&output_dir, stem);
        assert_eq!(copies.len(), 1, "{stem} copies: {copies:?}");
        assert_eq!(
            fs::read_to_string(output_dir.join(&copies[0])).expect("copy readable"),
            fs::read_to_string(fixed).expect("fixed file readable")
        );
    }
}

/// Files named `<stem>-<14 digit timestamp>.csv`.
fn timestamped_copies(dir: &Path, stem: &str) -> Vec<String> {
    let prefix = format!("{stem}-");
    fs::read_dir(dir)
        .expect("output dir readable")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            name.strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".csv"))
                .is_some_and(|stamp| stamp.len() == 14 && stamp.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect()
}

#[test]
fn given_canonical_exposures_when_inspected_then_source_columns_are_mapped_and_numbered() {
    let workspace = Workspace::new("scenario-canonical");
    let manager = workspace.manager();
    manager
        .add_model(piwind_model(&workspace, "1", CountingLookup::new()))
        .expect("model should be added");

    let report = manager
        .generate_oasis_files_for(&key("1"), GenerateOverrides::default())
        .expect("pipeline should complete");

    let canonical = report
        .files_pipeline
        .slot(PipelineSlot::CanonicalExposures)
        .expect("canonical slot");
    let name = canonical
        .file_name()
        .and_then(|name| name.to_str())
        .expect("file name");
    assert!(name.starts_with("canexp-") && name.ends_with(".csv"));

    let text = fs::read_to_string(canonical).expect("canonical readable");
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("ROW_ID,ACCNTNUM,WSCV1VAL,PostalCode,OccupancyCode")
    );
    assert_eq!(lines.next(), Some("1,L0001,220000,AB1 2CD,1050"));
}
