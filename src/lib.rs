pub mod config;
pub mod error;
pub mod locator;
pub mod manifest;
pub mod mkvtoolnix;
pub mod reconcile;
pub mod report;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

//
// Re-export
//
pub use config::Config;
pub use error::{Error, Result};
pub use manifest::{Episode, Manifest, Meta, TrackRule, VideoRule};
pub use mkvtoolnix::{
    Edit, MetadataTool, MkvToolnix, Property, Section, Snapshot, Track, TrackKind,
};
pub use reconcile::{Outcome, canonical_name, reconcile_episode};
pub use report::{Anomaly, AnomalyKind, Report};

/// Line printed when the run is over, whatever happened
pub const END_SENTINEL: &str = "<<<END>>>";

pub async fn run(config: Config) -> anyhow::Result<Report> {
    config.validate()?;
    info!(
        directory = %config.directory.display(),
        config = %config.config.display(),
        jobs = config.jobs,
        "Starting"
    );
    let tool = MkvToolnix::from_config(&config);
    Ok(run_with_tool(tool, &config.directory, &config.config).await?)
}

/// Tag every episode of the manifest found under `directory` using `tool`.
///
/// Episodes run concurrently. A failing episode is logged and reported as an
/// anomaly; the others carry on.
pub async fn run_with_tool<T: MetadataTool>(
    tool: T,
    directory: &Path,
    manifest_path: &Path,
) -> Result<Report> {
    let root = locator::ensure_directory(directory).await?;
    let manifest = Manifest::load(manifest_path).await?;
    let files: Arc<[PathBuf]> = locator::find_containers(&root).await?.into();

    let tool = Arc::new(tool);
    let meta = Arc::new(manifest.meta);
    let (reporter, collector) = report::channel();

    let mut tasks = JoinSet::new();
    for episode in manifest.episodes {
        let tool = tool.clone();
        let meta = meta.clone();
        let files = files.clone();
        let reporter = reporter.clone();
        tasks.spawn(async move {
            let name = canonical_name(&episode.id, &episode.name);
            let result = AssertUnwindSafe(reconcile_episode(
                tool.as_ref(),
                &meta,
                &files,
                &episode,
                &reporter,
            ))
            .catch_unwind()
            .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(error)) => {
                    error!(episode = %episode.id, %error, "Episode failed");
                    reporter.record(Anomaly::failed(name, &error));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(episode = %episode.id, panic = message, "Episode panicked");
                    reporter.record(Anomaly::failed(name, format!("panicked: {message}")));
                }
            }
        });
    }
    drop(reporter);

    while let Some(result) = tasks.join_next().await {
        if let Err(error) = result {
            error!(?error, "Episode task did not finish");
        }
    }

    let report = collector.finish().await;
    info!(
        anomalies = report.anomalies.len(),
        failures = report.failures(),
        "All episodes processed"
    );
    Ok(report)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
