use anyhow::Context;
use oasis_pipeline::{cli::config_path_from_args, config::Config, logging::init_tracing, runner};
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path_from_args()?;
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let logging_guard = init_tracing(&config.logging)?;
    let run_span = logging_guard.run_span().clone();
    run_span.in_scope(|| {
        tracing::info!(
            target: "runner",
            config = %config_path.display(),
            models = config.models.len(),
            "oasis_pipeline_started"
        );
    });

    runner::run(config).instrument(run_span).await
}
