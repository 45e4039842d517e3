use std::path::{Path, PathBuf};

use hound::WavReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};

/// A WAV file loaded fully into memory
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, hound::Error> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Capture backend that streams a WAV file as audio frames.
///
/// Frames carry `frame_duration_ms` of audio each and are delivered as fast
/// as the consumer drains them, with timestamps derived from sample offsets
/// in the file. Used for batch processing and hardware-free tests.
pub struct FileBackend {
    path: PathBuf,
    config: CaptureConfig,
    file: Option<AudioFile>,
    stream_task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
            file: None,
            stream_task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileBackend {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.file.is_some() {
            return Ok(());
        }

        let file = AudioFile::open(&self.path)
            .map_err(|e| CaptureError::PermissionDenied(format!("cannot open {}: {e}", self.path.display())))?;
        self.file = Some(file);
        Ok(())
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let file = self.file.as_ref().ok_or(CaptureError::NotPermitted)?;
        if self.stream_task.is_some() {
            return Err(CaptureError::Stream("capture already running".into()));
        }

        let sample_rate = file.sample_rate;
        let channels = file.channels;
        let samples = file.samples.clone();
        let samples_per_frame =
            (sample_rate as u64 * channels as u64 * self.config.frame_duration_ms / 1000).max(1)
                as usize;

        let (tx, rx) = mpsc::channel(100);

        self.stream_task = Some(tokio::spawn(async move {
            let mut offset = 0usize;
            while offset < samples.len() {
                let end = (offset + samples_per_frame).min(samples.len());
                let timestamp_ms =
                    offset as u64 * 1000 / (sample_rate as u64 * channels as u64);

                let frame = AudioFrame {
                    samples: samples[offset..end].to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };

                if tx.send(frame).await.is_err() {
                    break;
                }
                offset = end;
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.stream_task.take() {
            task.abort();
            let _ = task.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.stream_task.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.file
            .as_ref()
            .map(|f| f.sample_rate)
            .unwrap_or(self.config.sample_rate)
    }

    fn channels(&self) -> u16 {
        self.file
            .as_ref()
            .map(|f| f.channels)
            .unwrap_or(self.config.channels)
    }

    fn name(&self) -> &str {
        "file"
    }
}
