//! mltrack - Entry Point
//!
//! Runs the demo pipeline against the local file store. Takes no
//! arguments; see `mltrack::config` for the environment overrides.

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mltrack::config::PipelineConfig;
use mltrack::experiment::TrackingClient;
use mltrack::pipeline::run_pipeline;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mltrack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PipelineConfig::from_env().context("failed to load configuration")?;
    let tracking_dir = config.tracking_dir().to_path_buf();
    let mut client = TrackingClient::local(&tracking_dir)
        .with_context(|| format!("failed to open tracking dir {}", tracking_dir.display()))?;

    let report = match run_pipeline(&config, &mut client) {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "pipeline failed");
            return Err(e.into());
        }
    };
    info!(
        experiment_id = %report.experiment_id,
        run_id = %report.run_id,
        accuracy = report.accuracy,
        roc_auc = report.roc_auc,
        "run finished"
    );

    println!("Experiment: {}", report.experiment_id);
    println!("Run ID:     {}", report.run_id);
    println!("Tracking:   {}", tracking_dir.display());
    Ok(())
}
