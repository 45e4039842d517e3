pub mod audio;
pub mod config;
pub mod script;
pub mod session;
pub mod upload;

pub use audio::{
    AnalysisTap, AudioFile, AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureError, CaptureSource, ChannelBackend, EncodedSegment, FileBackend, LevelSnapshot,
    MicrophoneBackend, MicrophoneCapture, SegmentEncoder, SegmentFormat,
};
pub use config::Config;
pub use script::{Paragraph, ScriptCursor, ScriptDocument, ScriptPosition};
pub use session::{RecorderConfig, RecordingCoordinator, SessionError, SessionStats};
pub use upload::{
    HttpTransport, SegmentUploadQueue, TextSegmentUploader, TextUploadError, TransportError,
    UploadTransport,
};
