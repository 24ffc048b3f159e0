//! Photo reel planning worker binary.
//!
//! Usage: `reel-worker <job.json> [plan.json]`. The plan is written to the
//! second path, or to stdout when it is omitted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_worker::{GeminiVisionClient, JobFile, JobProcessor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel=info".parse()?);

    // Logs go to stderr so stdout stays clean for the plan
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    let mut args = std::env::args().skip(1);
    let Some(job_path) = args.next().map(PathBuf::from) else {
        bail!("usage: reel-worker <job.json> [plan.json]");
    };
    let output_path = args.next().map(PathBuf::from);

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let mut processor = JobProcessor::new(config.clone());
    if config.vision_enabled {
        match GeminiVisionClient::from_env(&config) {
            Ok(client) => processor = processor.with_vision(Arc::new(client)),
            Err(e) => warn!("Vision disabled: {}", e),
        }
    }

    let job = JobFile::load(&job_path)
        .await
        .with_context(|| format!("loading {}", job_path.display()))?;
    let output = processor.process(job).await?;
    let json = serde_json::to_string_pretty(&output)?;

    match output_path {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "Plan written");
        }
        None => println!("{}", json),
    }

    Ok(())
}
