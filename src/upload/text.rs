use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::warn;

use super::transport::{TransportError, UploadTransport};

/// Errors from the text side channel
#[derive(Debug, Error)]
pub enum TextUploadError {
    #[error("text upload failed: {0}")]
    Upload(#[from] TransportError),

    #[error("text uploader breaker is open; clear the error before retrying")]
    BreakerOpen,
}

/// Uploads spoken text tagged with the recording-clock offset, as a side
/// channel parallel to the audio segments.
///
/// One failed upload trips a sticky breaker: every later call fails
/// immediately, with no network attempt, until the caller explicitly
/// clears it. This stops un-alignable text from accumulating silently
/// while the network is degraded.
pub struct TextSegmentUploader {
    transport: Arc<dyn UploadTransport>,
    session_id: String,
    clock: watch::Receiver<f64>,
    tripped: AtomicBool,
}

impl TextSegmentUploader {
    pub fn new(
        transport: Arc<dyn UploadTransport>,
        session_id: impl Into<String>,
        clock: watch::Receiver<f64>,
    ) -> Self {
        Self {
            transport,
            session_id: session_id.into(),
            clock,
            tripped: AtomicBool::new(false),
        }
    }

    /// Upload one text segment, stamped with the clock value at call time.
    pub async fn upload_text_segment(&self, text: &str) -> Result<(), TextUploadError> {
        if self.tripped.load(Ordering::SeqCst) {
            return Err(TextUploadError::BreakerOpen);
        }

        let seek_end = *self.clock.borrow();

        match self
            .transport
            .upload_text_segment(&self.session_id, seek_end, text)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.tripped.store(true, Ordering::SeqCst);
                warn!("Text segment upload failed at {seek_end:.2}s; breaker tripped: {e}");
                Err(e.into())
            }
        }
    }

    /// Reset the breaker after the caller has handled the error.
    pub fn clear_error(&self) {
        self.tripped.store(false, Ordering::SeqCst);
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}
