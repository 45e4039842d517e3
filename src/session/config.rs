use serde::{Deserialize, Serialize};

/// Configuration for the recording coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Seconds of audio per uploaded segment.
    /// 0 disables slicing: one blob is cut on stop.
    pub segment_duration_secs: u64,

    /// Sliding-window size of the analysis tap, in samples.
    /// `None` disables the tap.
    pub analysis_window_samples: Option<usize>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            segment_duration_secs: 5,
            analysis_window_samples: None,
        }
    }
}
