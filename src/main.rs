use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reddit_archiver::archive::{Archiver, ProcessOutcome};
use reddit_archiver::config::Config;
use reddit_archiver::report::{ReportEntry, RunReport};
use reddit_archiver::store::ArchiveStore;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Archive every URL given on the command line. Returns `false` when every
/// post failed.
async fn run() -> Result<bool> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    let urls: Vec<String> = std::env::args()
        .skip(1)
        .map(|arg| arg.trim().to_string())
        .filter(|arg| !arg.is_empty() && !arg.starts_with('#'))
        .collect();
    if urls.is_empty() {
        anyhow::bail!("usage: reddit-archiver <post-url>...");
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!(
        data_root = %config.data_root.display(),
        media_dir = %config.media_dir.display(),
        posts = urls.len(),
        "Configuration loaded"
    );

    let archiver = Archiver::new(&config).context("Failed to build archiver")?;
    let store = ArchiveStore::new(&config.data_root);
    let mut report = match &config.reports_dir {
        Some(dir) => {
            let report = RunReport::create(dir)
                .await
                .context("Failed to create run report")?;
            info!(path = %report.path().display(), "Writing run report");
            Some(report)
        }
        None => None,
    };

    let (mut saved, mut skipped, mut failed) = (0usize, 0usize, 0usize);
    for (index, url) in urls.iter().enumerate() {
        if index > 0 && !config.post_delay.is_zero() {
            tokio::time::sleep(config.post_delay).await;
        }
        info!(index = index + 1, total = urls.len(), url = %url, "Processing post");

        let result = archiver.process(url, &store, config.skip_existing).await;
        match &result {
            Ok(ProcessOutcome::Saved { .. }) => saved += 1,
            Ok(ProcessOutcome::Skipped { .. }) => skipped += 1,
            Err(e) => {
                failed += 1;
                warn!(url = %url, status = ?e.http_status(), "Failed to archive post: {e}");
            }
        }

        if let Some(report) = report.as_mut() {
            if let Err(e) = report.record(&ReportEntry::from_result(url, &result)).await {
                warn!(url = %url, error = %e, "Failed to write run report entry");
            }
        }
    }

    info!(saved, skipped, failed, "Run complete");
    Ok(failed < urls.len())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reddit_archiver=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
