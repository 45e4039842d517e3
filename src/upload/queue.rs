use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::transport::UploadTransport;

/// One queued segment awaiting delivery.
///
/// Ownership transfers from the producer on enqueue; the queue holds the
/// item only until its upload completes or fails.
struct UploadItem {
    segment_id: u64,
    data: Vec<u8>,
    mime_type: String,
}

/// Ordered, in-memory queue delivering segments to the network one at a
/// time in a dedicated background task.
///
/// Strictly FIFO with a single upload in flight; a failed POST is logged
/// and the item dropped (never retried) so a persistent network fault can
/// never stall the session. `stop` drains everything accepted before it
/// returns, after which the queue can be started again for a new session.
pub struct SegmentUploadQueue {
    transport: Arc<dyn UploadTransport>,
    items: Arc<Mutex<VecDeque<UploadItem>>>,
    next_segment_id: AtomicU64,
    running: Arc<AtomicBool>,
    shutting_down: Arc<AtomicBool>,
    work_available: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SegmentUploadQueue {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            items: Arc::new(Mutex::new(VecDeque::new())),
            next_segment_id: AtomicU64::new(0),
            running: Arc::new(AtomicBool::new(false)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            work_available: Arc::new(Notify::new()),
            worker: Mutex::new(None),
        }
    }

    /// Launch the background consumption loop bound to `session_id`.
    ///
    /// No-op if already running. Resets the sequence counter to 0.
    pub fn start(&self, session_id: impl Into<String>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Upload queue already running; start ignored");
            return;
        }

        let session_id = session_id.into();
        self.next_segment_id.store(0, Ordering::SeqCst);
        self.shutting_down.store(false, Ordering::SeqCst);

        let transport = Arc::clone(&self.transport);
        let items = Arc::clone(&self.items);
        let shutting_down = Arc::clone(&self.shutting_down);
        let work_available = Arc::clone(&self.work_available);

        let handle = tokio::spawn(async move {
            info!("Upload loop started for session {session_id}");

            loop {
                let item = {
                    let mut queue = items.lock().expect("upload queue poisoned");
                    queue.pop_front()
                };

                match item {
                    Some(item) => {
                        let segment_id = item.segment_id;
                        let size = item.data.len();
                        match transport
                            .upload_segment(&session_id, segment_id, item.data, &item.mime_type)
                            .await
                        {
                            Ok(()) => {
                                debug!("Segment {segment_id} uploaded ({size} bytes)");
                            }
                            Err(e) => {
                                // Best-effort delivery: drop and advance
                                // rather than stall the whole session.
                                error!("Segment {segment_id} upload failed, dropped: {e}");
                            }
                        }
                    }
                    None => {
                        if shutting_down.load(Ordering::SeqCst) {
                            break;
                        }
                        // A permit stored by an enqueue that raced the drain
                        // wakes this immediately; no work is ever lost.
                        work_available.notified().await;
                    }
                }
            }

            info!("Upload loop drained for session {session_id}");
        });

        let mut worker = self.worker.lock().expect("worker handle poisoned");
        *worker = Some(handle);
    }

    /// Synchronous, non-blocking enqueue of one encoded blob.
    ///
    /// Assigns the next sequence index and signals the background loop.
    /// Zero-length blobs and blobs arriving while the queue is stopped or
    /// shutting down are discarded (logged).
    pub fn add_audio_blob(&self, data: Vec<u8>, mime_type: &str) {
        if data.is_empty() {
            warn!("Discarding zero-length audio blob");
            return;
        }
        if !self.running.load(Ordering::SeqCst) || self.shutting_down.load(Ordering::SeqCst) {
            warn!("Upload queue not accepting segments; blob discarded");
            return;
        }

        let segment_id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut queue = self.items.lock().expect("upload queue poisoned");
            queue.push_back(UploadItem {
                segment_id,
                data,
                mime_type: mime_type.to_string(),
            });
        }
        self.work_available.notify_one();
    }

    /// Drain the queue and stop the background loop.
    ///
    /// Returns only after every item accepted before this call has been
    /// uploaded or its upload attempted and failed. No-op if the queue is
    /// stopped or another stop is in progress. The queue is re-startable
    /// afterwards.
    pub async fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.work_available.notify_one();

        let handle = {
            let mut worker = self.worker.lock().expect("worker handle poisoned");
            worker.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Upload loop panicked: {e}");
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.shutting_down.store(false, Ordering::SeqCst);
    }

    /// Number of items waiting to be uploaded.
    pub fn pending(&self) -> usize {
        self.items.lock().expect("upload queue poisoned").len()
    }

    /// Sequence indices handed out since the last `start`.
    pub fn segments_accepted(&self) -> u64 {
        self.next_segment_id.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
