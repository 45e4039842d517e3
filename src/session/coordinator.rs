use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::config::RecorderConfig;
use super::stats::SessionStats;
use crate::audio::{
    negotiate_format, AnalysisTap, CaptureBackend, CaptureError, MicrophoneCapture,
};
use crate::upload::{SegmentUploadQueue, TextSegmentUploader, UploadTransport};

/// Errors surfaced by the coordinator
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

/// Composes capture and upload behind a ready/record/stop state machine.
///
/// Construction requests microphone permission once; `is_ready` reports the
/// outcome, and a refusal leaves the coordinator permanently not ready.
/// While recording, every blob the capture pipeline cuts is forwarded into
/// the upload queue, and the recording clock is exposed as a
/// subscribe/read-snapshot pair so consumers opt in to the 100ms ticks.
pub struct RecordingCoordinator {
    capture: MicrophoneCapture,
    queue: Arc<SegmentUploadQueue>,
    transport: Arc<dyn UploadTransport>,
    ready: bool,
    recording: bool,
    session_id: Option<String>,
    text_uploader: Option<Arc<TextSegmentUploader>>,
    started_at: Option<chrono::DateTime<Utc>>,
}

impl RecordingCoordinator {
    /// Build the pipeline and request microphone permission.
    pub async fn new(
        config: RecorderConfig,
        backend: Box<dyn CaptureBackend>,
        transport: Arc<dyn UploadTransport>,
    ) -> Self {
        let format = negotiate_format();

        let mut capture =
            MicrophoneCapture::new(backend, format, config.segment_duration_secs);
        if let Some(window) = config.analysis_window_samples {
            capture = capture.with_analysis(window);
        }

        let ready = match capture.request_permission().await {
            Ok(()) => true,
            Err(e) => {
                error!("Microphone permission refused: {e}");
                false
            }
        };

        let queue = Arc::new(SegmentUploadQueue::new(Arc::clone(&transport)));

        Self {
            capture,
            queue,
            transport,
            ready,
            recording: false,
            session_id: None,
            text_uploader: None,
            started_at: None,
        }
    }

    /// Start recording for `session_id`.
    ///
    /// No-op unless ready and not already recording. The upload queue is
    /// started first so the very first cut has somewhere to go; a capture
    /// start failure revokes readiness and tears the queue back down.
    pub async fn start_recording(&mut self, session_id: &str) -> Result<(), SessionError> {
        if !self.ready {
            warn!("Recorder not ready; start_recording ignored");
            return Ok(());
        }
        if self.recording {
            warn!("Already recording; start_recording ignored");
            return Ok(());
        }

        self.queue.start(session_id);

        let queue = Arc::clone(&self.queue);
        if let Err(e) = self
            .capture
            .start(move |segment| queue.add_audio_blob(segment.data, segment.mime_type))
            .await
        {
            error!("Capture failed to start: {e}");
            self.ready = false;
            self.queue.stop().await;
            return Err(e.into());
        }

        self.recording = true;
        self.session_id = Some(session_id.to_string());
        self.started_at = Some(Utc::now());
        self.text_uploader = Some(Arc::new(TextSegmentUploader::new(
            Arc::clone(&self.transport),
            session_id,
            self.capture.subscribe_clock(),
        )));

        info!("Recording started for session {session_id}");
        Ok(())
    }

    /// Stop recording.
    ///
    /// No-op unless recording. Stops capture first — its flush guarantees
    /// the final partial segment reaches the queue — then drains the queue.
    /// Resolves only after both have settled; a capture stop failure is
    /// surfaced after the queue has still been drained.
    pub async fn stop_recording(&mut self) -> Result<(), SessionError> {
        if !self.recording {
            return Ok(());
        }

        let capture_result = self.capture.stop().await;
        self.queue.stop().await;

        self.recording = false;
        self.text_uploader = None;
        let session_id = self.session_id.take();

        if let Some(session_id) = session_id {
            info!("Recording stopped for session {session_id}");
        }

        capture_result.map_err(Into::into)
    }

    /// Whether microphone permission was granted.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Snapshot of the recording clock; 0 when not recording.
    pub fn current_time(&self) -> f64 {
        if self.recording {
            self.capture.current_time()
        } else {
            0.0
        }
    }

    /// Subscribe to the periodic clock ticks.
    pub fn subscribe_clock(&self) -> watch::Receiver<f64> {
        self.capture.subscribe_clock()
    }

    /// The text side-channel uploader for the active session.
    pub fn text_uploader(&self) -> Option<Arc<TextSegmentUploader>> {
        self.text_uploader.clone()
    }

    /// Analysis tap handle, if enabled in the config.
    pub fn analysis(&self) -> Option<AnalysisTap> {
        self.capture.analysis()
    }

    /// Current session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            is_recording: self.recording,
            started_at: self.started_at,
            duration_secs: self.capture.current_time(),
            segments_accepted: self.queue.segments_accepted(),
            segments_pending: self.queue.pending(),
        }
    }
}
