//! Composition worker binary.
//!
//! Usage: `reelsmith-worker <request.json>`. Prints the composition result as
//! JSON and exits non-zero when the render failed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelsmith_media::{Composer, FfmpegRunner, FfprobeProbe};
use reelsmith_speech::ElevenLabsClient;
use reelsmith_storage::{R2Client, R2Config};
use reelsmith_worker::{
    load_request, progress_observer, AdmissionControl, CompositionService, WorkerConfig,
};

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("reelsmith=info".parse()?);

    // Logs go to stderr; stdout carries the result
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
    Ok(())
}

/// First Ctrl-C cancels running transcodes; a second one exits.
fn cancel_on_interrupt() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, cancelling running transcodes");
        let _ = cancel_tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
    cancel_rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    let _ = rustls::crypto::ring::default_provider().install_default();

    dotenvy::dotenv().ok();
    init_tracing()?;

    let request_path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: reelsmith-worker <request.json>")?;

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let request = load_request(&request_path, &config)
        .await
        .with_context(|| format!("failed to load {}", request_path.display()))?;

    let composer = Composer::new(
        Arc::new(FfprobeProbe::new().with_timeout(config.probe_timeout)),
        Arc::new(
            FfmpegRunner::new()
                .with_timeout(config.ffmpeg_timeout)
                .with_cancel(cancel_on_interrupt())
                .with_progress(progress_observer()),
        ),
        config.composer_config(),
    );
    let mut service = CompositionService::new(composer, AdmissionControl::new(config.max_concurrent));

    if R2Config::is_configured() {
        let client = R2Client::from_env().context("invalid R2 configuration")?;
        service = service.with_uploader(Arc::new(client));
    } else {
        info!("R2 not configured, renders stay local");
    }

    if request.narration.is_some() {
        match ElevenLabsClient::from_env() {
            Ok(client) => service = service.with_speech(Arc::new(client)),
            Err(e) => warn!("Speech synthesis unavailable: {}", e),
        }
    }

    let result = service.handle(request).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
