use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::analysis::AnalysisTap;
use super::backend::{CaptureBackend, CaptureError};
use super::encoder::{EncodedSegment, SegmentEncoder};
use super::format::SegmentFormat;

/// Cadence of the recording-clock publications.
pub const CLOCK_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Owns the capture backend and its encoding pipeline; turns a continuous
/// stream into a sequence of discrete encoded segments.
///
/// State machine: `Idle -> (request_permission) -> Permitted -> (start) ->
/// Recording -> (stop) -> Permitted`. Permission is requested at most once
/// and cached. `start` while recording (or while a stop is in progress) and
/// `stop` while not recording are no-ops.
pub struct MicrophoneCapture {
    backend: Box<dyn CaptureBackend>,
    format: SegmentFormat,
    /// Seconds of audio per segment; 0 means a single blob cut on stop
    segment_duration_secs: u64,
    permitted: bool,
    recording: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    /// Mono samples processed by the encode task; the recording clock
    clock_samples: Arc<AtomicU64>,
    clock_tx: Arc<watch::Sender<f64>>,
    clock_rx: watch::Receiver<f64>,
    tick_task: Option<JoinHandle<()>>,
    encode_task: Option<JoinHandle<Result<(), CaptureError>>>,
    analysis: Option<AnalysisTap>,
}

impl MicrophoneCapture {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        format: SegmentFormat,
        segment_duration_secs: u64,
    ) -> Self {
        let (clock_tx, clock_rx) = watch::channel(0.0);

        Self {
            backend,
            format,
            segment_duration_secs,
            permitted: false,
            recording: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
            clock_samples: Arc::new(AtomicU64::new(0)),
            clock_tx: Arc::new(clock_tx),
            clock_rx,
            tick_task: None,
            encode_task: None,
            analysis: None,
        }
    }

    /// Enable the read-only analysis tap, wired in parallel to the encoding
    /// path. Must be called before the first `start`.
    pub fn with_analysis(mut self, window_samples: usize) -> Self {
        self.analysis = Some(AnalysisTap::new(window_samples));
        self
    }

    /// Handle onto the analysis tap, if enabled at construction.
    pub fn analysis(&self) -> Option<AnalysisTap> {
        self.analysis.clone()
    }

    /// Idempotently acquire the capture device.
    ///
    /// Does not start encoding. A refusal surfaces as
    /// [`CaptureError::PermissionDenied`] and leaves the capture unpermitted.
    pub async fn request_permission(&mut self) -> Result<(), CaptureError> {
        if self.permitted {
            return Ok(());
        }

        self.backend.acquire().await?;
        self.permitted = true;
        Ok(())
    }

    /// Begin routing captured audio through the encoder.
    ///
    /// Cuts a segment every `segment_duration_secs` seconds of audio (never,
    /// if 0) and invokes `on_segment` once per cut, in time order, from the
    /// encode task itself. Also starts the periodic clock-tick publication.
    pub async fn start<F>(&mut self, on_segment: F) -> Result<(), CaptureError>
    where
        F: FnMut(EncodedSegment) + Send + 'static,
    {
        if !self.permitted {
            return Err(CaptureError::NotPermitted);
        }
        if self.recording.load(Ordering::SeqCst) || self.stopping.load(Ordering::SeqCst) {
            warn!("Capture already recording; start ignored");
            return Ok(());
        }

        let mut frame_rx = self.backend.start().await?;
        let sample_rate = self.backend.sample_rate();

        self.clock_samples.store(0, Ordering::SeqCst);
        let _ = self.clock_tx.send(0.0);
        self.recording.store(true, Ordering::SeqCst);

        // Encode task: single consumer of the frame channel. It exits when
        // intake halts (channel closes), flushing the final partial segment
        // through `on_segment` first.
        let mut encoder = SegmentEncoder::new(self.format, sample_rate);
        let segment_secs = self.segment_duration_secs as f64;
        let clock_samples = Arc::clone(&self.clock_samples);
        let tap = self.analysis.clone();
        let mut on_segment = on_segment;

        self.encode_task = Some(tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Some(tap) = &tap {
                    tap.ingest(&frame);
                }

                let mono_samples = frame.samples.len() as u64 / frame.channels.max(1) as u64;
                clock_samples.fetch_add(mono_samples, Ordering::SeqCst);

                encoder.push_frame(&frame);

                if segment_secs > 0.0 && encoder.buffered_secs() >= segment_secs {
                    if let Some(segment) = encoder.cut()? {
                        on_segment(segment);
                    }
                }
            }

            // Intake has halted; finalize the trailing partial segment.
            if let Some(segment) = encoder.cut()? {
                on_segment(segment);
            }

            Ok(())
        }));

        // Tick task: bounds clock-update frequency for UI consumers.
        let clock_tx = Arc::clone(&self.clock_tx);
        let clock_samples = Arc::clone(&self.clock_samples);
        self.tick_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLOCK_TICK_INTERVAL);
            loop {
                ticker.tick().await;
                let secs = clock_samples.load(Ordering::SeqCst) as f64 / sample_rate as f64;
                let _ = clock_tx.send(secs);
            }
        }));

        info!(
            "Capture started via {} backend ({} Hz, segment length {}s)",
            self.backend.name(),
            sample_rate,
            self.segment_duration_secs
        );

        Ok(())
    }

    /// Stop recording.
    ///
    /// Halts audio intake first, then waits for the encoder to flush and
    /// deliver the final partial segment, then stops the clock ticks and
    /// releases the device. Does not resolve before the flush completes.
    pub async fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.recording.load(Ordering::SeqCst) || self.stopping.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.stopping.store(true, Ordering::SeqCst);

        // 1. Halt intake so no further audio is captured; this closes the
        //    frame channel the encode task drains against.
        let halt_result = self.backend.stop().await;
        if let Err(e) = halt_result {
            if let Some(task) = self.encode_task.take() {
                task.abort();
                let _ = task.await;
            }
            self.halt_ticks().await;
            self.recording.store(false, Ordering::SeqCst);
            self.stopping.store(false, Ordering::SeqCst);
            return Err(e);
        }

        // 2. Wait for the encoder to drain and finalize.
        let flush_result = match self.encode_task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(CaptureError::Task(e.to_string())),
            },
            None => Ok(()),
        };

        // 3. Stop clock publications.
        self.halt_ticks().await;

        self.recording.store(false, Ordering::SeqCst);
        self.stopping.store(false, Ordering::SeqCst);

        info!("Capture stopped");
        flush_result
    }

    async fn halt_ticks(&mut self) {
        if let Some(task) = self.tick_task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Current recording-clock value in seconds. Meaningful only while
    /// recording.
    pub fn current_time(&self) -> f64 {
        let sample_rate = self.backend.sample_rate();
        if sample_rate == 0 {
            return 0.0;
        }
        self.clock_samples.load(Ordering::SeqCst) as f64 / sample_rate as f64
    }

    /// Subscribe to the periodic clock-tick publications.
    pub fn subscribe_clock(&self) -> watch::Receiver<f64> {
        self.clock_rx.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_permitted(&self) -> bool {
        self.permitted
    }

    /// Negotiated segment format for this capture.
    pub fn format(&self) -> SegmentFormat {
        self.format
    }
}
