#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use recital_capture::{TransportError, UploadTransport};

/// One observed call against the mock transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUpload {
    Segment {
        session_id: String,
        segment_id: u64,
        bytes: usize,
        mime_type: String,
    },
    Text {
        session_id: String,
        seek_end: f64,
        text: String,
    },
}

/// In-memory transport double recording every upload attempt.
///
/// Attempts are recorded before the success/failure decision, so tests can
/// assert on what the network observed, including failed POSTs.
pub struct MockTransport {
    uploads: Mutex<Vec<RecordedUpload>>,
    fail_segments: HashSet<u64>,
    fail_text: AtomicBool,
    segment_delay: Option<Duration>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(HashSet::new(), None))
    }

    /// Transport that fails uploads of the given segment ids.
    pub fn failing_segments(ids: &[u64]) -> Arc<Self> {
        Arc::new(Self::build(ids.iter().copied().collect(), None))
    }

    /// Transport where every segment upload takes `delay` to complete.
    pub fn with_segment_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(HashSet::new(), Some(delay)))
    }

    fn build(fail_segments: HashSet<u64>, segment_delay: Option<Duration>) -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail_segments,
            fail_text: AtomicBool::new(false),
            segment_delay,
            in_flight: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
        }
    }

    pub fn set_fail_text(&self, fail: bool) {
        self.fail_text.store(fail, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    /// `(session_id, segment_id, bytes)` of every segment attempt, in order.
    pub fn segment_records(&self) -> Vec<(String, u64, usize)> {
        self.recorded()
            .into_iter()
            .filter_map(|u| match u {
                RecordedUpload::Segment {
                    session_id,
                    segment_id,
                    bytes,
                    ..
                } => Some((session_id, segment_id, bytes)),
                _ => None,
            })
            .collect()
    }

    /// `(session_id, seek_end, text)` of every text attempt, in order.
    pub fn text_records(&self) -> Vec<(String, f64, String)> {
        self.recorded()
            .into_iter()
            .filter_map(|u| match u {
                RecordedUpload::Text {
                    session_id,
                    seek_end,
                    text,
                } => Some((session_id, seek_end, text)),
                _ => None,
            })
            .collect()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_records().len()
    }

    /// True if two segment uploads were ever in flight at once.
    pub fn saw_overlap(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl UploadTransport for MockTransport {
    async fn upload_segment(
        &self,
        session_id: &str,
        segment_id: u64,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<(), TransportError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }

        match self.segment_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        self.uploads.lock().unwrap().push(RecordedUpload::Segment {
            session_id: session_id.to_string(),
            segment_id,
            bytes: data.len(),
            mime_type: mime_type.to_string(),
        });

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_segments.contains(&segment_id) {
            return Err(TransportError::Status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
        Ok(())
    }

    async fn upload_text_segment(
        &self,
        session_id: &str,
        seek_end: f64,
        text: &str,
    ) -> Result<(), TransportError> {
        self.uploads.lock().unwrap().push(RecordedUpload::Text {
            session_id: session_id.to_string(),
            seek_end,
            text: text.to_string(),
        });

        if self.fail_text.load(Ordering::SeqCst) {
            return Err(TransportError::Status(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ));
        }
        Ok(())
    }
}

/// Poll `cond` until it holds or `timeout` elapses; returns the final state.
pub async fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
