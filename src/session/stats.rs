use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the current or most recent recording started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds of audio captured, per the recording clock
    pub duration_secs: f64,

    /// Segments handed to the upload queue so far
    pub segments_accepted: u64,

    /// Segments still waiting to be uploaded
    pub segments_pending: usize,
}
