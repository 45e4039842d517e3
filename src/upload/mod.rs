//! Segment and text delivery to the recording backend
//!
//! This module provides:
//! - The transport seam (`UploadTransport`) and its HTTP implementation
//! - The ordered, single-in-flight `SegmentUploadQueue`
//! - The `TextSegmentUploader` side channel with its sticky breaker

mod queue;
mod text;
mod transport;

pub use queue::SegmentUploadQueue;
pub use text::{TextSegmentUploader, TextUploadError};
pub use transport::{HttpTransport, TransportError, UploadTransport};
