use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use recital_capture::{
    CaptureBackendFactory, CaptureConfig, CaptureSource, Config, HttpTransport, RecorderConfig,
    RecordingCoordinator,
};
use tracing::{info, warn};

/// Record audio and stream it to a recording backend in segments.
#[derive(Debug, Parser)]
#[command(name = "recital-capture")]
struct Cli {
    /// Config file (TOML, without extension)
    #[arg(long, default_value = "config/recital-capture")]
    config: String,

    /// Session identifier; generated when omitted
    #[arg(long)]
    session_id: Option<String>,

    /// Record from a WAV file instead of the microphone
    #[arg(long)]
    input_file: Option<PathBuf>,

    /// Seconds to record before stopping
    #[arg(long, default_value_t = 10)]
    duration_secs: u64,

    /// Text to upload as an aligned text segment at the start of recording
    #[arg(long)]
    text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let cfg = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config {} not loaded ({e}); using defaults", cli.config);
            Config::default()
        }
    };

    info!("{} starting", cfg.service.name);

    let session_id = cli
        .session_id
        .unwrap_or_else(|| format!("session-{}", uuid::Uuid::new_v4()));

    let source = match cli.input_file {
        Some(path) => CaptureSource::File(path),
        None => CaptureSource::Microphone,
    };

    let capture_config = CaptureConfig {
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        ..CaptureConfig::default()
    };
    let backend = CaptureBackendFactory::create(source, capture_config)?;

    let transport = Arc::new(HttpTransport::new(&cfg.upload.endpoint)?);

    let recorder_config = RecorderConfig {
        segment_duration_secs: cfg.audio.segment_duration_secs,
        ..RecorderConfig::default()
    };

    let mut coordinator = RecordingCoordinator::new(recorder_config, backend, transport).await;
    if !coordinator.is_ready() {
        anyhow::bail!("microphone permission was not granted");
    }

    coordinator.start_recording(&session_id).await?;

    // Print progress off the clock signal, once per whole second.
    let mut clock = coordinator.subscribe_clock();
    let progress = tokio::spawn(async move {
        let mut last_whole = 0u64;
        while clock.changed().await.is_ok() {
            let secs = *clock.borrow();
            if secs as u64 > last_whole {
                last_whole = secs as u64;
                info!("Recording... {last_whole}s");
            }
        }
    });

    if let Some(text) = &cli.text {
        if let Some(uploader) = coordinator.text_uploader() {
            if let Err(e) = uploader.upload_text_segment(text).await {
                warn!("Text segment not uploaded: {e}");
            }
        }
    }

    tokio::time::sleep(Duration::from_secs(cli.duration_secs)).await;

    coordinator.stop_recording().await?;
    progress.abort();

    let stats = coordinator.stats();
    info!(
        "Session {} complete: {:.1}s recorded, {} segments uploaded or attempted",
        session_id, stats.duration_secs, stats.segments_accepted
    );

    Ok(())
}
