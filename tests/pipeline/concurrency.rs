use std::{sync::Arc, thread};

use oasis_pipeline::{exposures::GenerateOverrides, files::PipelineStage};

use crate::support::{CountingLookup, Workspace, key, piwind_model};

#[test]
fn given_two_models_when_generated_in_parallel_then_each_completes_in_its_own_directory() {
    let workspace = Workspace::new("concurrency-models");
    let manager = Arc::new(workspace.manager());
    let lookups = [CountingLookup::new(), CountingLookup::new()];
    for (version, lookup) in ["1", "2"].into_iter().zip(&lookups) {
        manager
            .add_model(piwind_model(&workspace, version, lookup.clone()))
            .expect("model should be added");
    }

    let reports = thread::scope(|scope| {
        let handles = ["1", "2"].map(|version| {
            let manager = Arc::clone(&manager);
            scope.spawn(move || {
                manager.generate_oasis_files_for(&key(version), GenerateOverrides::default())
            })
        });
        handles.map(|handle| {
            handle
                .join()
                .expect("worker should not panic")
                .expect("pipeline should complete")
        })
    });

    for (version, report) in ["1", "2"].into_iter().zip(&reports) {
        assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
        let dir = workspace
            .root
            .join("Files")
            .join(format!("OasisLMF-PiWind-{version}"));
        for (_, path) in report.files_pipeline.snapshot() {
            if path.starts_with(&workspace.root.join("Files")) {
                assert!(path.starts_with(&dir), "{} escaped {}", path.display(), dir.display());
            }
        }
    }
    assert!(lookups.iter().all(|lookup| lookup.calls() == 1));
}

#[test]
fn given_two_managers_sharing_files_root_when_generating_in_parallel_then_both_complete() {
    let workspace = Workspace::new("concurrency-managers");
    let managers = [workspace.manager(), workspace.manager()];
    let lookups = [CountingLookup::new(), CountingLookup::new()];
    for ((manager, version), lookup) in managers.iter().zip(["1", "2"]).zip(&lookups) {
        manager
            .add_model(piwind_model(&workspace, version, lookup.clone()))
            .expect("model should be added");
    }

    let reports = thread::scope(|scope| {
        let handles = managers.iter().zip(["1", "2"]).map(|(manager, version)| {
            scope.spawn(move || {
                let report = manager
                    .generate_oasis_files_for(&key(version), GenerateOverrides::default())?;
                manager.save_state(&key(version))?;
                Ok::<_, oasis_pipeline::PipelineError>(report)
            })
        });
        handles
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("worker should not panic")
                    .expect("pipeline should complete")
            })
            .collect::<Vec<_>>()
    });

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.files_pipeline.stage(), PipelineStage::Complete);
        assert_eq!(report.executed.len(), 6);
    }
    assert_ne!(reports[0].files_pipeline, reports[1].files_pipeline);
    assert!(lookups.iter().all(|lookup| lookup.calls() == 1));
    for version in ["1", "2"] {
        let dir = workspace
            .root
            .join("Files")
            .join(format!("OasisLMF-PiWind-{version}"));
        assert!(dir.join("items.csv").is_file());
        assert!(managers[0].persistence_for(&key(version)).exists());
    }
}

#[test]
fn given_one_model_when_generated_twice_concurrently_then_stages_run_once() {
    let workspace = Workspace::new("concurrency-same");
    let manager = Arc::new(workspace.manager());
    let lookup = CountingLookup::new();
    manager
        .add_model(piwind_model(&workspace, "1", lookup.clone()))
        .expect("model should be added");

    let reports = thread::scope(|scope| {
        let handles = [0, 1].map(|_| {
            let manager = Arc::clone(&manager);
            scope.spawn(move || {
                manager.generate_oasis_files_for(&key("1"), GenerateOverrides::default())
            })
        });
        handles.map(|handle| {
            handle
                .join()
                .expect("worker should not panic")
                .expect("pipeline should complete")
        })
    });

    assert_eq!(lookup.calls(), 1);
    let executed = reports.iter().map(|report| report.executed.len()).sum::<usize>();
    assert_eq!(executed, 6);
    assert_eq!(reports[0].files_pipeline, reports[1].files_pipeline);
}
