//! Merge orchestrator integration tests
//!
//! Drive `start_merge` end to end over in-memory WAV clips and check the
//! state machine, the event stream and the stored output.

mod helpers;

use clipmix_common::config::OutputFormat;
use clipmix_common::{MergeEvent, MergeStage, PipelineState};
use clipmix_engine::pipeline::MergeSummary;
use clipmix_engine::{
    AmbientBed, EncodeSettings, Error, MergeOrchestrator, MergeOutcome, MergeRequest, MixConfig, NoiseKind,
    SampleDecoder,
};
use helpers::*;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::Receiver;

fn orchestrator() -> MergeOrchestrator {
    MergeOrchestrator::new(MixConfig::default(), EncodeSettings::default())
}

/// Orchestrator whose encoder sleeps per block and reports every block
fn slow_orchestrator() -> MergeOrchestrator {
    let mut encode = EncodeSettings::default().with_format(OutputFormat::Wav);
    encode.progress_interval_blocks = 1;
    MergeOrchestrator::with_encoder_factory(
        MixConfig::default(),
        encode,
        slow_factory(Arc::new(AtomicUsize::new(0)), Duration::from_millis(5)),
    )
}

fn wav_request(crossfade_seconds: f64) -> MergeRequest {
    MergeRequest::default()
        .with_crossfade(crossfade_seconds)
        .with_format(OutputFormat::Wav)
}

fn drain(events: &mut Receiver<MergeEvent>) -> Vec<MergeEvent> {
    let mut out = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return out,
        }
    }
}

fn completed(outcome: MergeOutcome) -> MergeSummary {
    match outcome {
        MergeOutcome::Completed(summary) => summary,
        MergeOutcome::Cancelled => panic!("merge was cancelled"),
    }
}

/// Wait for the next event matching `pred`
async fn wait_for(events: &mut Receiver<MergeEvent>, pred: impl Fn(&MergeEvent) -> bool) {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return,
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("event channel closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("timed out waiting for event");
}

#[tokio::test]
async fn test_single_clip_is_rejected() {
    let orchestrator = orchestrator();
    let playlist = playlist_of(vec![silent_wav(TEST_SAMPLE_RATE, 2, 500)]);

    let result = orchestrator.start_merge(&playlist, MergeRequest::default()).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Idle);
    assert_eq!(status.progress, 0);
}

#[tokio::test]
async fn test_wav_merge_completes() {
    let orchestrator = orchestrator();
    let mut events = orchestrator.subscribe();
    let mut playlist = playlist_of(vec![
        sine_wav(TEST_SAMPLE_RATE, 2, 2000, 440.0, 0.3),
        sine_wav(TEST_SAMPLE_RATE, 2, 2000, 660.0, 0.3),
    ]);
    assert!(playlist.iter().all(|c| !c.has_duration()));

    let summary = completed(orchestrator.start_merge(&playlist, wav_request(1.0)).await.unwrap());

    // 2 + 2 - 1 = 3 seconds of 16-bit stereo
    let expected_len = 44 + 132_300 * 4;
    assert_eq!(summary.output_len, expected_len);
    assert!((summary.duration_seconds - 3.0).abs() < 1e-9);

    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Completed);
    assert_eq!(status.progress, 100);
    assert_eq!(status.output_len, Some(expected_len));
    assert!(status.error.is_none());

    let events = drain(&mut events);
    assert!(matches!(
        events.first(),
        Some(MergeEvent::StateChanged {
            old_state: PipelineState::Idle,
            new_state: PipelineState::Processing,
            ..
        })
    ));
    let decoded = events
        .iter()
        .filter(|e| matches!(e, MergeEvent::ClipDecoded { .. }))
        .count();
    assert_eq!(decoded, 2);
    assert!(matches!(events.last(), Some(MergeEvent::Completed { .. })));

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            MergeEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] < w[1]), "{:?}", percents);
    assert_eq!(percents.last(), Some(&100));

    summary.apply_durations(&mut playlist);
    assert!(playlist.iter().all(|c| (c.duration_seconds - 2.0).abs() < 1e-6));

    let bytes = orchestrator.take_output().await.unwrap();
    assert_eq!(bytes.len(), expected_len);
    let merged = SampleDecoder::decode(&bytes).unwrap();
    assert_eq!(merged.frames(), 132_300);
    assert!(orchestrator.take_output().await.is_none());
}

#[tokio::test]
async fn test_mp3_merge_is_decodable() {
    let orchestrator = orchestrator();
    let playlist = playlist_of(vec![
        sine_wav(22050, 1, 1500, 440.0, 0.4),
        sine_wav(48000, 2, 1500, 550.0, 0.4),
    ]);

    let request = MergeRequest::default().with_crossfade(0.5);
    completed(orchestrator.start_merge(&playlist, request).await.unwrap());

    let bytes = orchestrator.take_output().await.unwrap();
    let merged = SampleDecoder::decode_with_hint(&bytes, Some("mp3")).unwrap();
    assert_eq!(merged.sample_rate(), 44100);
    assert_eq!(merged.channel_count(), 2);
    let duration = merged.duration_seconds();
    assert!((2.5..2.7).contains(&duration), "duration = {}", duration);
}

#[tokio::test]
async fn test_undecodable_clip_fails() {
    let orchestrator = orchestrator();
    let mut events = orchestrator.subscribe();
    let mut playlist = playlist_of(vec![silent_wav(TEST_SAMPLE_RATE, 2, 500)]);
    playlist.add("notes.txt", b"shopping list\n".repeat(50));

    let result = orchestrator.start_merge(&playlist, wav_request(0.0)).await;
    assert!(matches!(result, Err(Error::Decode(ref msg)) if msg.contains("notes.txt")));

    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Failed);
    assert!(status.error.unwrap().contains("notes.txt"));
    assert!(orchestrator.take_output().await.is_none());

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, MergeEvent::Failed { .. })));
    assert!(!events.iter().any(|e| matches!(e, MergeEvent::Completed { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_encode() {
    let orchestrator = Arc::new(slow_orchestrator());
    let mut events = orchestrator.subscribe();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 2, 5500),
        silent_wav(TEST_SAMPLE_RATE, 2, 5500),
    ]);

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.start_merge(&playlist, wav_request(1.0)).await })
    };

    wait_for(&mut events, |e| {
        matches!(e, MergeEvent::Progress { stage: MergeStage::Encoding, percent, .. } if *percent > 50)
    })
    .await;
    orchestrator.cancel().await;

    let outcome = task.await.unwrap().unwrap();
    assert_eq!(outcome, MergeOutcome::Cancelled);

    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Idle);
    assert_eq!(status.progress, 0);
    assert!(status.error.is_none());
    assert!(status.output_len.is_none());
    assert!(orchestrator.take_output().await.is_none());

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(e, MergeEvent::Cancelled { .. })));
    assert!(!events.iter().any(|e| matches!(e, MergeEvent::Completed { .. })));
}

/// Everything published after a cancelled merge stopped ends with the
/// return to Idle, and nothing follows it
async fn assert_stopped_quietly(orchestrator: &MergeOrchestrator, events: &mut Receiver<MergeEvent>) -> Vec<MergeEvent> {
    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Idle);
    assert_eq!(status.progress, 0);
    assert!(status.error.is_none());
    assert!(status.output_len.is_none());

    let seen = drain(events);
    assert!(seen.iter().any(|e| matches!(e, MergeEvent::Cancelled { .. })));
    assert!(
        matches!(
            seen.last(),
            Some(MergeEvent::StateChanged { old_state: PipelineState::Processing, new_state: PipelineState::Idle, .. })
        ),
        "last event: {:?}",
        seen.last()
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    let late = drain(events);
    assert!(late.is_empty(), "events after Idle: {:?}", late);
    assert_eq!(orchestrator.status().await.progress, 0);
    seen
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_decode() {
    let orchestrator = Arc::new(slow_orchestrator());
    let mut events = orchestrator.subscribe();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 1, 100),
        sine_wav(TEST_SAMPLE_RATE, 1, 120_000, 440.0, 0.5),
        silent_wav(TEST_SAMPLE_RATE, 1, 100),
    ]);

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.start_merge(&playlist, wav_request(0.0)).await })
    };

    wait_for(&mut events, |e| matches!(e, MergeEvent::ClipDecoded { .. })).await;
    orchestrator.cancel().await;

    assert_eq!(task.await.unwrap().unwrap(), MergeOutcome::Cancelled);
    let seen = assert_stopped_quietly(&orchestrator, &mut events).await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, MergeEvent::Progress { stage: MergeStage::Encoding, .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_render() {
    let orchestrator = Arc::new(slow_orchestrator());
    let mut events = orchestrator.subscribe();
    // Off-rate clips so the render stage has resampling to do
    let playlist = playlist_of(vec![
        sine_wav(48_000, 2, 30_000, 440.0, 0.5),
        sine_wav(48_000, 2, 30_000, 660.0, 0.5),
    ]);

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.start_merge(&playlist, wav_request(2.0)).await })
    };

    wait_for(&mut events, |e| {
        matches!(e, MergeEvent::Progress { stage: MergeStage::Rendering, percent: 35, .. })
    })
    .await;
    orchestrator.cancel().await;

    assert_eq!(task.await.unwrap().unwrap(), MergeOutcome::Cancelled);
    let seen = assert_stopped_quietly(&orchestrator, &mut events).await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, MergeEvent::Progress { percent, .. } if *percent >= 50)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reset_waits_for_in_flight_merge() {
    let orchestrator = Arc::new(slow_orchestrator());
    let mut events = orchestrator.subscribe();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 1, 100),
        sine_wav(TEST_SAMPLE_RATE, 1, 120_000, 440.0, 0.5),
        silent_wav(TEST_SAMPLE_RATE, 1, 100),
    ]);

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.start_merge(&playlist, wav_request(0.0)).await })
    };

    wait_for(&mut events, |e| matches!(e, MergeEvent::ClipDecoded { .. })).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    orchestrator.reset().await;

    // The merge has already stopped by the time reset returns
    assert_stopped_quietly(&orchestrator, &mut events).await;
    assert_eq!(task.await.unwrap().unwrap(), MergeOutcome::Cancelled);

    // A merge started afterwards counts up from zero
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 2, 500),
        silent_wav(TEST_SAMPLE_RATE, 2, 500),
    ]);
    completed(orchestrator.start_merge(&playlist, wav_request(0.0)).await.unwrap());
    let percents: Vec<u8> = drain(&mut events)
        .iter()
        .filter_map(|e| match e {
            MergeEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert_eq!(percents.first(), Some(&15));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_merge_while_processing_is_rejected() {
    let orchestrator = Arc::new(slow_orchestrator());
    let mut events = orchestrator.subscribe();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 2, 5000),
        silent_wav(TEST_SAMPLE_RATE, 2, 5000),
    ]);

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        let playlist = playlist.clone();
        tokio::spawn(async move { orchestrator.start_merge(&playlist, wav_request(0.0)).await })
    };

    wait_for(&mut events, |e| {
        matches!(e, MergeEvent::StateChanged { new_state: PipelineState::Processing, .. })
    })
    .await;

    let second = orchestrator.start_merge(&playlist, wav_request(0.0)).await;
    assert!(matches!(second, Err(Error::InvalidState(_))));
    assert_eq!(orchestrator.status().await.state, PipelineState::Processing);

    orchestrator.cancel().await;
    assert_eq!(task.await.unwrap().unwrap(), MergeOutcome::Cancelled);
}

#[tokio::test]
async fn test_ambient_intro_extends_timeline() {
    let orchestrator = orchestrator();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 2, 1000),
        silent_wav(TEST_SAMPLE_RATE, 2, 1000),
    ]);

    let mut request = wav_request(0.0);
    request.intro = Some(AmbientBed::new(NoiseKind::Pink, 0.5));
    let summary = completed(orchestrator.start_merge(&playlist, request).await.unwrap());

    assert!((summary.duration_seconds - 2.5).abs() < 1e-9);
    assert_eq!(summary.output_len, 44 + 110_250 * 4);
    // Beds are not playlist clips
    assert_eq!(summary.clip_durations.len(), 2);

    let merged = SampleDecoder::decode(&orchestrator.take_output().await.unwrap()).unwrap();
    let left = merged.channel(0).unwrap();
    assert!(left[..22_050].iter().any(|s| s.abs() > 0.01));
    assert!(left[22_050..].iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn test_normalize_levels_clips() {
    let orchestrator = orchestrator();
    let playlist = playlist_of(vec![
        constant_wav(TEST_SAMPLE_RATE, 2, 1000, 0.05),
        constant_wav(TEST_SAMPLE_RATE, 2, 1000, 0.3),
    ]);

    let mut request = wav_request(0.0);
    request.normalize = true;
    completed(orchestrator.start_merge(&playlist, request).await.unwrap());

    let merged = SampleDecoder::decode(&orchestrator.take_output().await.unwrap()).unwrap();
    let left = merged.channel(0).unwrap();
    for frame in [22_050, 44_100 + 22_050] {
        assert!((left[frame] - 0.15).abs() < 2e-3, "frame {}: {}", frame, left[frame]);
    }
}

#[tokio::test]
async fn test_reset_after_completion() {
    let orchestrator = orchestrator();
    let playlist = playlist_of(vec![
        silent_wav(TEST_SAMPLE_RATE, 2, 500),
        silent_wav(TEST_SAMPLE_RATE, 2, 500),
    ]);
    completed(orchestrator.start_merge(&playlist, wav_request(0.0)).await.unwrap());
    assert_eq!(orchestrator.status().await.state, PipelineState::Completed);

    orchestrator.reset().await;

    let status = orchestrator.status().await;
    assert_eq!(status.state, PipelineState::Idle);
    assert_eq!(status.progress, 0);
    assert!(status.output_len.is_none());
    assert!(orchestrator.take_output().await.is_none());

    // And a fresh merge runs normally afterwards
    completed(orchestrator.start_merge(&playlist, wav_request(0.0)).await.unwrap());
}
