use std::io::Cursor;

use tracing::debug;

use super::backend::AudioFrame;
use super::format::SegmentFormat;

/// One encoded, time-bounded slice of captured audio.
///
/// Immutable once created; produced by the encoder, consumed exactly once
/// by the upload queue.
#[derive(Debug, Clone)]
pub struct EncodedSegment {
    /// Encoded bytes in the negotiated container format
    pub data: Vec<u8>,
    /// MIME type matching the negotiated format
    pub mime_type: &'static str,
    /// Recording-clock offset at which this segment starts
    pub start_secs: f64,
    /// Recording-clock offset at which this segment ends
    pub end_secs: f64,
}

/// Accumulates captured frames and cuts them into encoded segments.
///
/// Incoming frames are downmixed to mono regardless of the input channel
/// count; the encoder output is always single-channel. `cut` encodes and
/// drains whatever is buffered, so the caller controls the slicing cadence.
pub struct SegmentEncoder {
    format: SegmentFormat,
    sample_rate: u32,
    /// Mono samples buffered since the last cut
    samples: Vec<i16>,
    /// Recording-clock offset where the current buffer starts
    cut_offset_secs: f64,
}

impl SegmentEncoder {
    pub fn new(format: SegmentFormat, sample_rate: u32) -> Self {
        Self {
            format,
            sample_rate,
            samples: Vec::new(),
            cut_offset_secs: 0.0,
        }
    }

    /// Append a frame to the current segment buffer, downmixing to mono.
    pub fn push_frame(&mut self, frame: &AudioFrame) {
        if frame.channels <= 1 {
            self.samples.extend_from_slice(&frame.samples);
            return;
        }

        let channels = frame.channels as usize;
        self.samples.reserve(frame.samples.len() / channels);

        // Sum channels without division to preserve volume, clipping on overflow
        for group in frame.samples.chunks_exact(channels) {
            let sum: i32 = group.iter().map(|&s| s as i32).sum();
            self.samples
                .push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
        }
    }

    /// Seconds of audio buffered since the last cut.
    pub fn buffered_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Encode and drain the buffered audio into a segment.
    ///
    /// Returns `None` when nothing is buffered — zero-length segments are
    /// never produced.
    pub fn cut(&mut self) -> Result<Option<EncodedSegment>, hound::Error> {
        if self.samples.is_empty() {
            return Ok(None);
        }

        let start_secs = self.cut_offset_secs;
        let end_secs = start_secs + self.buffered_secs();

        let data = match self.format {
            SegmentFormat::WavPcm16 => self.encode_wav()?,
            SegmentFormat::RawPcm16 => self
                .samples
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect(),
        };

        debug!(
            "Segment cut: {:.2}s - {:.2}s ({} bytes, {})",
            start_secs,
            end_secs,
            data.len(),
            self.format.mime_type()
        );

        self.samples.clear();
        self.cut_offset_secs = end_secs;

        Ok(Some(EncodedSegment {
            data,
            mime_type: self.format.mime_type(),
            start_secs,
            end_secs,
        }))
    }

    fn encode_wav(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut data = Vec::new();
        {
            let cursor = Cursor::new(&mut data);
            let mut writer = hound::WavWriter::new(cursor, spec)?;
            for &sample in &self.samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }

        Ok(data)
    }
}
