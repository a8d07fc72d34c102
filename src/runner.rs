use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::{
    signal::unix::{SignalKind, signal},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::PipelineError,
    exposures::{ExposuresManager, GenerateOverrides, OasisFilesReport},
    model::{ModelKey, ModelRegistry},
};

struct ModelRun {
    key: ModelKey,
    result: Result<OasisFilesReport, PipelineError>,
    saved: Result<std::path::PathBuf, PipelineError>,
}

/// Runs every configured model's pipeline concurrently, each on its own
/// blocking worker, until all finish or a signal cancels them.
pub async fn run(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let manager = Arc::new(
        ExposuresManager::new(
            config.pipeline.manager_settings(),
            Arc::new(ModelRegistry::new()),
        )
        .with_cancellation(cancel.clone()),
    );

    let mut keys = Vec::with_capacity(config.models.len());
    for model_config in &config.models {
        let model = model_config.to_model().with_context(|| {
            format!(
                "invalid model {}/{}/{}",
                model_config.supplier_id, model_config.model_id, model_config.model_version_id
            )
        })?;
        let key = model.key().clone();
        manager
            .add_model(model)
            .with_context(|| format!("failed to register model {key}"))?;
        if manager
            .restore_state(&key)
            .with_context(|| format!("failed to restore pipeline state of {key}"))?
        {
            tracing::info!(target: "runner", model_key = %key, "pipeline_state_restored");
        }
        keys.push(key);
    }

    if keys.is_empty() {
        eprintln!("no models configured; nothing to do");
        return Ok(());
    }

    let mut runs = JoinSet::new();
    for key in keys.iter().cloned() {
        let manager = Arc::clone(&manager);
        let overrides = GenerateOverrides {
            force: config.pipeline.force,
            ..GenerateOverrides::default()
        };
        let span = tracing::info_span!(target: "runner", "model_pipeline", model_key = %key);
        runs.spawn_blocking(move || {
            let _entered = span.enter();
            let result = manager.generate_oasis_files_for(&key, overrides);
            let saved = manager.save_state(&key);
            ModelRun { key, result, saved }
        });
    }

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;

    let total = keys.len();
    let mut failures = 0_usize;
    loop {
        tokio::select! {
            _ = sigint.recv(), if !cancel.is_cancelled() => {
                eprintln!("received SIGINT; cancelling in-flight pipelines");
                cancel.cancel();
            }
            _ = sigterm.recv(), if !cancel.is_cancelled() => {
                eprintln!("received SIGTERM; cancelling in-flight pipelines");
                cancel.cancel();
            }
            joined = runs.join_next() => {
                let Some(joined) = joined else {
                    break;
                };
                let run = joined.context("pipeline worker join failed")?;
                if !report_run(&run) {
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {total} model pipelines failed");
    }
    eprintln!("oasis files generated for {total} model(s)");
    Ok(())
}

fn report_run(run: &ModelRun) -> bool {
    if let Err(err) = &run.saved {
        tracing::warn!(
            target: "runner",
            model_key = %run.key,
            error = %err,
            "pipeline_state_save_failed"
        );
    }

    match &run.result {
        Ok(report) => {
            tracing::info!(
                target: "runner",
                model_key = %run.key,
                executed = report.executed.len(),
                skipped = report.skipped.len(),
                unmatched = report.unmatched(),
                "model_pipeline_completed"
            );
            eprintln!(
                "{}: {:?} ({} stage(s) run, {} unmatched keys)",
                run.key,
                report.files_pipeline.stage(),
                report.executed.len(),
                report.unmatched()
            );
            run.saved.is_ok()
        }
        Err(err) => {
            tracing::error!(
                target: "runner",
                model_key = %run.key,
                kind = ?err.kind,
                slot = ?err.slot,
                error = %err,
                "model_pipeline_failed"
            );
            eprintln!("{}: failed: {err}", run.key);
            false
        }
    }
}
