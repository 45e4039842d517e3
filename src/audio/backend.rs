use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started, derived from the
    /// number of samples delivered so far (audio clock, not wall clock)
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Configuration for capture backends
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Preferred sample rate (backends may report a different native rate)
    pub sample_rate: u32,
    /// Preferred channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 100,
        }
    }
}

/// Errors from capture backends and the recording state machine
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture not permitted; request permission first")]
    NotPermitted,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("segment encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("capture task failed: {0}")]
    Task(String),
}

/// Audio capture backend trait
///
/// The hardware seam of the pipeline. `acquire` claims the device (the
/// permission-request analog), `start` hands back a frame channel, and
/// `stop` halts intake and releases the device. The frame channel closing
/// is the end-of-stream signal downstream consumers drain against.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Claim the capture device. Idempotent; does not start capturing.
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive audio frames until
    /// `stop` is called (or the source is exhausted).
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Stop capturing audio and release the device.
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Sample rate of the frames this backend produces, known after `acquire`
    fn sample_rate(&self) -> u32;

    /// Channel count of the frames this backend produces, known after `acquire`
    fn channels(&self) -> u16;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Default microphone input
    Microphone,
    /// WAV file input (for testing/batch processing)
    File(PathBuf),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create a capture backend for the given source
    pub fn create(
        source: CaptureSource,
        config: CaptureConfig,
    ) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        match source {
            CaptureSource::Microphone => {
                let backend = super::mic::MicrophoneBackend::new(config);
                Ok(Box::new(backend))
            }
            CaptureSource::File(path) => {
                let backend = super::file::FileBackend::new(path, config);
                Ok(Box::new(backend))
            }
        }
    }
}

/// Capture backend fed by an externally held frame sender.
///
/// Single-shot: the source receiver is consumed by the first `start`.
/// Used by tests and batch simulations to drive the pipeline with
/// hand-built frames.
pub struct ChannelBackend {
    sample_rate: u32,
    channels: u16,
    source_rx: Option<mpsc::Receiver<AudioFrame>>,
    forward_task: Option<JoinHandle<()>>,
}

impl ChannelBackend {
    pub fn new(source_rx: mpsc::Receiver<AudioFrame>, sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            source_rx: Some(source_rx),
            forward_task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ChannelBackend {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let mut source = self
            .source_rx
            .take()
            .ok_or_else(|| CaptureError::Stream("channel source already consumed".into()))?;

        let (tx, rx) = mpsc::channel(100);

        // Aborting the forwarder on stop drops `tx`, which closes the
        // downstream channel even while the external sender is still alive.
        self.forward_task = Some(tokio::spawn(async move {
            while let Some(frame) = source.recv().await {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.forward_task.take() {
            task.abort();
            let _ = task.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.forward_task.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn name(&self) -> &str {
        "channel"
    }
}
