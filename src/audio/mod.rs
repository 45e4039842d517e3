pub mod analysis;
pub mod backend;
pub mod capture;
pub mod encoder;
pub mod file;
pub mod format;
pub mod mic;

pub use analysis::{AnalysisTap, LevelSnapshot};
pub use backend::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureError,
    CaptureSource, ChannelBackend,
};
pub use capture::{MicrophoneCapture, CLOCK_TICK_INTERVAL};
pub use encoder::{EncodedSegment, SegmentEncoder};
pub use file::{AudioFile, FileBackend};
pub use format::{negotiate_format, SegmentFormat, FORMAT_PRIORITY};
pub use mic::MicrophoneBackend;
