use tracing::info;

/// Container/codec pair used for encoded segments.
///
/// The choice is made once, up front, by [`negotiate_format`] and injected
/// into the capture pipeline; every blob the uploader sees carries the
/// matching MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFormat {
    /// 16-bit PCM in a RIFF/WAV container
    WavPcm16,
    /// Headerless little-endian 16-bit PCM
    RawPcm16,
}

/// Candidate formats in descending preference order.
pub const FORMAT_PRIORITY: &[SegmentFormat] = &[SegmentFormat::WavPcm16, SegmentFormat::RawPcm16];

impl SegmentFormat {
    /// MIME type surfaced to the uploader with each blob
    pub fn mime_type(self) -> &'static str {
        match self {
            SegmentFormat::WavPcm16 => "audio/wav",
            SegmentFormat::RawPcm16 => "audio/pcm",
        }
    }

    /// File extension for upload part names
    pub fn extension(self) -> &'static str {
        match self {
            SegmentFormat::WavPcm16 => "wav",
            SegmentFormat::RawPcm16 => "pcm",
        }
    }

    /// Whether an encoder for this format is compiled into this build
    pub fn is_available(self) -> bool {
        match self {
            SegmentFormat::WavPcm16 => true, // hound
            SegmentFormat::RawPcm16 => true,
        }
    }
}

/// Probe the priority list and commit to the first supported format.
pub fn negotiate_format() -> SegmentFormat {
    let format = FORMAT_PRIORITY
        .iter()
        .copied()
        .find(|f| f.is_available())
        .unwrap_or(SegmentFormat::RawPcm16);

    info!("Segment format negotiated: {:?} ({})", format, format.mime_type());
    format
}
