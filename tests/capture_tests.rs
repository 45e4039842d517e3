// Integration tests for the capture state machine and segment slicing
//
// Frames are driven through a ChannelBackend (or a temp WAV file) so the
// cadence cuts, the final flush on stop, and the recording clock can be
// verified without hardware.

mod common;

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::wait_until;
use recital_capture::{
    AudioFrame, CaptureBackendFactory, CaptureConfig, CaptureError, CaptureSource,
    ChannelBackend, EncodedSegment, MicrophoneCapture, SegmentFormat,
};
use tokio::sync::mpsc;

fn frame(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AudioFrame {
    AudioFrame {
        samples,
        sample_rate,
        channels,
        timestamp_ms: 0,
    }
}

fn collector() -> (Arc<Mutex<Vec<EncodedSegment>>>, impl FnMut(EncodedSegment) + Send + 'static)
{
    let segments: Arc<Mutex<Vec<EncodedSegment>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&segments);
    (segments, move |segment| sink.lock().unwrap().push(segment))
}

fn decoded_len(segment: &EncodedSegment) -> u32 {
    hound::WavReader::new(Cursor::new(segment.data.clone()))
        .unwrap()
        .len()
}

#[tokio::test]
async fn test_segments_cut_at_cadence_in_time_order() {
    let (tx, rx) = mpsc::channel(100);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 1);
    capture.request_permission().await.unwrap();

    let (segments, sink) = collector();
    capture.start(sink).await.unwrap();

    // 2.5 seconds of audio in 250-sample frames -> two full slices + a tail
    for _ in 0..10 {
        tx.send(frame(vec![7i16; 250], 1000, 1)).await.unwrap();
    }
    drop(tx);

    assert!(
        wait_until(
            || segments.lock().unwrap().len() == 3,
            Duration::from_secs(2)
        )
        .await
    );
    capture.stop().await.unwrap();

    let segments = segments.lock().unwrap();
    let lens: Vec<u32> = segments.iter().map(decoded_len).collect();
    assert_eq!(lens, vec![1000, 1000, 500]);
    assert!(segments.iter().all(|s| s.mime_type == "audio/wav"));

    assert_eq!(segments[0].start_secs, 0.0);
    assert!((segments[1].start_secs - 1.0).abs() < 1e-9);
    assert!((segments[2].start_secs - 2.0).abs() < 1e-9);
    assert!((segments[2].end_secs - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_zero_segment_length_emits_single_blob_on_stop() {
    let (tx, rx) = mpsc::channel(100);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 0);
    capture.request_permission().await.unwrap();

    let (segments, sink) = collector();
    capture.start(sink).await.unwrap();

    for _ in 0..6 {
        tx.send(frame(vec![3i16; 250], 1000, 1)).await.unwrap();
    }

    // Wait for the pipeline to absorb all 1500 samples, then confirm no
    // blob was cut while recording continued.
    assert!(wait_until(|| capture.current_time() >= 1.5, Duration::from_secs(2)).await);
    assert!(segments.lock().unwrap().is_empty());

    capture.stop().await.unwrap();

    let segments = segments.lock().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(decoded_len(&segments[0]), 1500);
}

#[tokio::test]
async fn test_start_while_recording_is_a_noop() {
    let (tx, rx) = mpsc::channel(100);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 0);
    capture.request_permission().await.unwrap();

    let (segments, sink) = collector();
    capture.start(sink).await.unwrap();

    let (second_segments, second_sink) = collector();
    capture.start(second_sink).await.unwrap();
    assert!(capture.is_recording());

    tx.send(frame(vec![1i16; 500], 1000, 1)).await.unwrap();
    assert!(wait_until(|| capture.current_time() >= 0.5, Duration::from_secs(2)).await);

    capture.stop().await.unwrap();

    assert_eq!(segments.lock().unwrap().len(), 1);
    assert!(second_segments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_while_not_recording_is_a_noop() {
    let (_tx, rx) = mpsc::channel::<AudioFrame>(1);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 1);
    capture.request_permission().await.unwrap();

    capture.stop().await.unwrap();
    assert!(!capture.is_recording());
}

#[tokio::test]
async fn test_start_without_permission_is_rejected() {
    let (_tx, rx) = mpsc::channel::<AudioFrame>(1);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 1);

    let (_segments, sink) = collector();
    let result = capture.start(sink).await;
    assert!(matches!(result, Err(CaptureError::NotPermitted)));
}

#[tokio::test]
async fn test_clock_ticks_reach_subscribers() {
    let (tx, rx) = mpsc::channel(100);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 0);
    capture.request_permission().await.unwrap();

    let clock = capture.subscribe_clock();

    let (_segments, sink) = collector();
    capture.start(sink).await.unwrap();

    for _ in 0..6 {
        tx.send(frame(vec![0i16; 250], 1000, 1)).await.unwrap();
    }

    assert!(wait_until(|| capture.current_time() >= 1.5, Duration::from_secs(2)).await);
    // The watch channel lags the clock by at most one 100ms tick
    assert!(wait_until(|| *clock.borrow() >= 1.5, Duration::from_secs(2)).await);

    capture.stop().await.unwrap();
}

#[tokio::test]
async fn test_analysis_tap_sees_levels_without_affecting_segments() {
    let (tx, rx) = mpsc::channel(100);
    let backend = ChannelBackend::new(rx, 1000, 1);
    let mut capture = MicrophoneCapture::new(Box::new(backend), SegmentFormat::WavPcm16, 0)
        .with_analysis(1000);
    capture.request_permission().await.unwrap();

    let tap = capture.analysis().expect("tap enabled");

    let (segments, sink) = collector();
    capture.start(sink).await.unwrap();

    tx.send(frame(vec![i16::MAX / 2; 500], 1000, 1)).await.unwrap();
    assert!(wait_until(|| capture.current_time() >= 0.5, Duration::from_secs(2)).await);

    let levels = tap.levels();
    assert!(levels.peak > 0.4);
    assert!(levels.rms > 0.4);

    capture.stop().await.unwrap();
    assert_eq!(segments.lock().unwrap().len(), 1);
    assert_eq!(decoded_len(&segments.lock().unwrap()[0]), 500);
}

#[tokio::test]
async fn test_file_backend_streams_a_wav_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.wav");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..4000 {
        writer.write_sample((i % 128) as i16).unwrap();
    }
    writer.finalize().unwrap();

    let backend =
        CaptureBackendFactory::create(CaptureSource::File(path), CaptureConfig::default())
            .unwrap();
    let mut capture = MicrophoneCapture::new(backend, SegmentFormat::WavPcm16, 0);
    capture.request_permission().await.unwrap();

    let (segments, sink) = collector();
    capture.start(sink).await.unwrap();

    // The file drains on its own; the single blob is cut once the stream ends
    assert!(
        wait_until(
            || segments.lock().unwrap().len() == 1,
            Duration::from_secs(2)
        )
        .await
    );
    capture.stop().await.unwrap();

    let segments = segments.lock().unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(decoded_len(&segments[0]), 4000);
}
