use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioFrame, CaptureBackend, CaptureConfig, CaptureError};

/// Microphone capture backend built on cpal.
///
/// The cpal stream is not `Send`, so the device is opened and the stream
/// owned by a dedicated audio thread. Frames cross back over an mpsc
/// channel; `stop` flips a condvar-guarded flag, the thread drops the
/// stream (releasing the hardware) and exits.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    /// Native format reported by the device, filled in by `acquire`
    negotiated: Option<(u32, u16)>,
    worker: Option<MicWorker>,
}

struct MicWorker {
    stop: Arc<StopSignal>,
    handle: thread::JoinHandle<()>,
}

struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn raise(&self) {
        let mut stopped = self.stopped.lock().expect("stop signal poisoned");
        *stopped = true;
        self.cv.notify_all();
    }

    fn wait(&self) {
        let mut stopped = self.stopped.lock().expect("stop signal poisoned");
        while !*stopped {
            stopped = self.cv.wait(stopped).expect("stop signal poisoned");
        }
    }
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            negotiated: None,
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.negotiated.is_some() {
            return Ok(());
        }

        // Device probing can block; keep it off the async runtime.
        let probed = tokio::task::spawn_blocking(|| -> Result<(u32, u16), String> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| "no input device available".to_string())?;
            let supported = device
                .default_input_config()
                .map_err(|e| format!("input config unavailable: {e}"))?;
            Ok((supported.sample_rate().0, supported.channels()))
        })
        .await
        .map_err(|e| CaptureError::Task(e.to_string()))?
        .map_err(CaptureError::PermissionDenied)?;

        info!(
            "Microphone acquired: {} Hz, {} channel(s)",
            probed.0, probed.1
        );
        self.negotiated = Some(probed);

        Ok(())
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.negotiated.is_none() {
            return Err(CaptureError::NotPermitted);
        }
        if self.worker.is_some() {
            return Err(CaptureError::Stream("capture already running".into()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(100);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(StopSignal::new());

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || run_capture_thread(frame_tx, ready_tx, thread_stop))
            .map_err(|e| CaptureError::Stream(format!("failed to spawn audio thread: {e}")))?;

        // Wait for the thread to report the stream running (or failed).
        match ready_rx.await {
            Ok(Ok(())) => {
                self.worker = Some(MicWorker { stop, handle });
                Ok(frame_rx)
            }
            Ok(Err(msg)) => {
                let _ = handle.join();
                Err(CaptureError::Stream(msg))
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Stream("audio thread exited during startup".into()))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker.stop.raise();

        tokio::task::spawn_blocking(move || worker.handle.join())
            .await
            .map_err(|e| CaptureError::Task(e.to_string()))?
            .map_err(|_| CaptureError::Task("audio thread panicked".into()))?;

        info!("Microphone released");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.negotiated
            .map(|(rate, _)| rate)
            .unwrap_or(self.config.sample_rate)
    }

    fn channels(&self) -> u16 {
        self.negotiated
            .map(|(_, channels)| channels)
            .unwrap_or(self.config.channels)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Body of the dedicated audio thread: open the device, run the stream
/// until the stop signal is raised, then drop it.
fn run_capture_thread(
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<(), String>>,
    stop: Arc<StopSignal>,
) {
    let stream = match open_input_stream(frame_tx) {
        Ok(stream) => stream,
        Err(msg) => {
            let _ = ready_tx.send(Err(msg));
            return;
        }
    };

    let _ = ready_tx.send(Ok(()));

    stop.wait();
    drop(stream);
}

fn open_input_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no input device available".to_string())?;
    let supported = device
        .default_input_config()
        .map_err(|e| format!("input config unavailable: {e}"))?;

    let sample_format = supported.sample_format();
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let stream_config: cpal::StreamConfig = supported.into();

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(
            &device,
            &stream_config,
            frame_tx,
            sample_rate,
            channels,
            |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
        ),
        cpal::SampleFormat::I16 => build_stream::<i16>(
            &device,
            &stream_config,
            frame_tx,
            sample_rate,
            channels,
            |s| s,
        ),
        cpal::SampleFormat::U16 => build_stream::<u16>(
            &device,
            &stream_config,
            frame_tx,
            sample_rate,
            channels,
            |s| (s as i32 - 32768) as i16,
        ),
        other => {
            return Err(format!("unsupported input sample format: {other:?}"));
        }
    }
    .map_err(|e| format!("failed to build input stream: {e}"))?;

    stream
        .play()
        .map_err(|e| format!("failed to start input stream: {e}"))?;

    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    channels: u16,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    // Interleaved samples delivered so far; the recording clock is derived
    // from this, never from wall time.
    let mut samples_sent: u64 = 0;
    let mut dropped_frames: u64 = 0;

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<i16> = data.iter().map(|&s| convert(s)).collect();
            let timestamp_ms = samples_sent * 1000 / (sample_rate as u64 * channels as u64);
            samples_sent += data.len() as u64;

            let frame = AudioFrame {
                samples,
                sample_rate,
                channels,
                timestamp_ms,
            };

            // The consumer fell behind; dropping here is preferable to
            // blocking the audio callback.
            if frame_tx.try_send(frame).is_err() {
                dropped_frames += 1;
                if dropped_frames % 100 == 1 {
                    warn!("audio consumer lagging: {} frames dropped", dropped_frames);
                }
            }
        },
        |err: cpal::StreamError| {
            error!("cpal stream error: {err}");
        },
        None,
    )
}
