// Integration tests for the segment upload queue
//
// These tests verify strict FIFO single-in-flight delivery, the
// drop-on-failure policy, and orderly drain-on-stop semantics, all against
// a mock transport.

mod common;

use std::time::Duration;

use common::MockTransport;
use recital_capture::SegmentUploadQueue;

#[tokio::test]
async fn test_uploads_are_fifo_single_flight_and_failures_not_retried() {
    let transport = MockTransport::failing_segments(&[1]);
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.start("session-a");
    queue.add_audio_blob(vec![1u8; 10], "audio/wav");
    queue.add_audio_blob(vec![2u8; 20], "audio/wav");
    queue.add_audio_blob(vec![3u8; 30], "audio/wav");
    queue.stop().await;

    // Exactly 3 sequential attempts in index order; the failed #1 was
    // dropped, not retried.
    let records = transport.segment_records();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records,
        vec![
            ("session-a".to_string(), 0, 10),
            ("session-a".to_string(), 1, 20),
            ("session-a".to_string(), 2, 30),
        ]
    );
    assert!(!transport.saw_overlap(), "uploads must not overlap");
}

#[tokio::test]
async fn test_zero_length_blob_never_reaches_the_network() {
    let transport = MockTransport::new();
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.start("session-a");
    queue.add_audio_blob(Vec::new(), "audio/wav");
    queue.add_audio_blob(vec![9u8; 5], "audio/wav");
    queue.stop().await;

    // The empty blob consumed no sequence index and caused no POST.
    assert_eq!(queue.segments_accepted(), 1);
    assert_eq!(
        transport.segment_records(),
        vec![("session-a".to_string(), 0, 5)]
    );
}

#[tokio::test]
async fn test_stop_before_any_enqueue_resolves_and_queue_restarts() {
    let transport = MockTransport::new();
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.start("session-a");
    queue.stop().await;
    assert!(!queue.is_running());
    assert_eq!(transport.segment_count(), 0);

    // Immediately re-startable, with a fresh sequence for the new session
    queue.start("session-b");
    queue.add_audio_blob(vec![1u8; 4], "audio/wav");
    queue.stop().await;

    assert_eq!(
        transport.segment_records(),
        vec![("session-b".to_string(), 0, 4)]
    );
}

#[tokio::test]
async fn test_enqueue_while_stopped_is_discarded() {
    let transport = MockTransport::new();
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.add_audio_blob(vec![1u8; 8], "audio/wav");

    queue.start("session-a");
    queue.stop().await;

    queue.add_audio_blob(vec![2u8; 8], "audio/wav");

    assert_eq!(transport.segment_count(), 0);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn test_items_enqueued_during_drain_are_still_delivered() {
    let transport = MockTransport::with_segment_delay(Duration::from_millis(50));
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.start("session-a");
    queue.add_audio_blob(vec![1u8; 10], "audio/wav");

    // Let the first upload get in flight, then race two more enqueues
    // against the drain.
    tokio::time::sleep(Duration::from_millis(10)).await;
    queue.add_audio_blob(vec![2u8; 10], "audio/wav");
    queue.add_audio_blob(vec![3u8; 10], "audio/wav");

    queue.stop().await;

    let ids: Vec<u64> = transport
        .segment_records()
        .into_iter()
        .map(|(_, id, _)| id)
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert!(!transport.saw_overlap());
}

#[tokio::test]
async fn test_start_while_running_is_a_noop() {
    let transport = MockTransport::new();
    let queue = SegmentUploadQueue::new(transport.clone());

    queue.start("session-a");
    queue.add_audio_blob(vec![1u8; 6], "audio/wav");

    // Second start must not rebind the session or reset the sequence
    queue.start("session-b");
    queue.add_audio_blob(vec![2u8; 6], "audio/wav");

    queue.stop().await;

    assert_eq!(
        transport.segment_records(),
        vec![
            ("session-a".to_string(), 0, 6),
            ("session-a".to_string(), 1, 6),
        ]
    );
}
