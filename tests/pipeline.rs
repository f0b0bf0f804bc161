//! End-to-end scenarios through the full pipeline: monitors → cooldown
//! gate → dispatch workers → alert store, under paused tokio time.

use std::sync::Arc;
use std::time::Duration;

use examguard::alert::InMemoryAlertStore;
use examguard::types::FrameSignals;
use examguard::{AlertStore, MonitorConfig, ProctorService, SessionId, ViolationKind};

const SESSION: SessionId = 42;

/// PCM16 square wave whose RMS normalizes to roughly amplitude/32768.
fn pcm_chunk(amplitude: i16, samples: usize) -> Vec<u8> {
    std::iter::repeat(amplitude)
        .take(samples)
        .enumerate()
        .flat_map(|(i, a)| (if i % 2 == 0 { a } else { -a }).to_le_bytes())
        .collect()
}

fn service() -> (ProctorService, Arc<InMemoryAlertStore>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(InMemoryAlertStore::new());
    let service = ProctorService::new(MonitorConfig::default(), store.clone());
    (service, store)
}

fn count_kind(store: &InMemoryAlertStore, session: SessionId, kind: ViolationKind) -> usize {
    store
        .alerts_for_session(session)
        .iter()
        .filter(|alert| alert.kind == kind)
        .count()
}

/// Let the dispatch workers drain the queue. With a paused clock this
/// advances time, so keep the steps small relative to cooldowns.
async fn drain() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn repeated_voice_within_cooldown_yields_one_alert() {
    let (service, store) = service();
    service.start_session(SESSION);

    // Three loud chunks (~0.8 level) within five seconds
    let loud = pcm_chunk(26000, 64);
    for _ in 0..3 {
        let (produced, level) = service.ingest_audio_chunk(SESSION, &loud).unwrap();
        assert!(produced);
        assert!(level > 0.5, "level = {level}");
        drain().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    // Second and third candidates fell inside the 20s cooldown
    assert_eq!(count_kind(&store, SESSION, ViolationKind::VoiceDetected), 1);

    // Past the cooldown window, a fourth loud chunk creates a second alert
    tokio::time::sleep(Duration::from_secs(21)).await;
    service.ingest_audio_chunk(SESSION, &loud).unwrap();
    drain().await;

    assert_eq!(count_kind(&store, SESSION, ViolationKind::VoiceDetected), 2);

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn every_tab_switch_becomes_an_alert() {
    let (service, store) = service();
    service.start_session(SESSION);

    for _ in 0..3 {
        service.tab_switch(SESSION);
    }
    drain().await;

    // Zero cooldown: all three admitted and persisted
    assert_eq!(count_kind(&store, SESSION, ViolationKind::TabSwitch), 3);

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn sustained_noise_flagged_by_background_loop() {
    let (service, store) = service();
    service.start_session(SESSION);

    // Majority-loud window, individual candidates drained along the way
    let loud = pcm_chunk(26000, 64);
    for _ in 0..10 {
        service.ingest_audio_chunk(SESSION, &loud).unwrap();
    }

    // One evaluation interval later the window classifier fires
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(count_kind(&store, SESSION, ViolationKind::SustainedNoise) >= 1);

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn frame_signals_flow_through_cooldowns() {
    let (service, store) = service();
    service.start_session(SESSION);

    // No face in frame, repeated faster than the 15s cooldown
    let no_face = FrameSignals {
        face_count: Some(0),
        ..Default::default()
    };
    for _ in 0..4 {
        service.process_frame(SESSION, no_face);
        drain().await;
    }
    assert_eq!(count_kind(&store, SESSION, ViolationKind::NoFaceDetected), 1);

    // Distinct kinds are gated independently
    service.process_frame(
        SESSION,
        FrameSignals {
            face_count: Some(3),
            is_looking_at_screen: Some(false),
            phone_detected: true,
            raised_hand_detected: false,
        },
    );
    drain().await;

    assert_eq!(count_kind(&store, SESSION, ViolationKind::MultipleFaces), 1);
    assert_eq!(count_kind(&store, SESSION, ViolationKind::LookingAway), 1);
    assert_eq!(count_kind(&store, SESSION, ViolationKind::PhoneUsage), 1);

    // Detector unavailable: nothing new flagged
    service.process_frame(SESSION, FrameSignals::default());
    drain().await;
    let summary = store.summary(SESSION);
    assert_eq!(summary.total, 4);

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stopped_session_goes_quiet() {
    let (service, store) = service();
    service.start_session(SESSION);
    assert!(service.status(SESSION).is_some());

    assert!(service.stop_session(SESSION).await.unwrap());
    assert!(service.status(SESSION).is_none());

    // Signals for the dead session are dropped at every layer
    assert!(service.ingest_audio_chunk(SESSION, &pcm_chunk(26000, 64)).is_none());
    service.tab_switch(SESSION);
    service.process_frame(
        SESSION,
        FrameSignals {
            face_count: Some(0),
            ..Default::default()
        },
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(store.alerts_for_session(SESSION).is_empty());

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_do_not_share_cooldowns() {
    let (service, store) = service();
    service.start_session(1);
    service.start_session(2);

    let loud = pcm_chunk(26000, 64);
    service.ingest_audio_chunk(1, &loud).unwrap();
    service.ingest_audio_chunk(2, &loud).unwrap();
    drain().await;

    assert_eq!(count_kind(&store, 1, ViolationKind::VoiceDetected), 1);
    assert_eq!(count_kind(&store, 2, ViolationKind::VoiceDetected), 1);

    // Ending one session leaves the other running
    service.stop_session(1).await.unwrap();
    assert!(service.status(1).is_none());
    assert!(service.status(2).is_some());

    service.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn integrity_score_reflects_alert_volume() {
    let (service, store) = service();
    service.start_session(SESSION);

    for _ in 0..3 {
        service.tab_switch(SESSION);
    }
    drain().await;

    assert_eq!(store.integrity_score(SESSION), 70);
    let summary = store.summary(SESSION);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.high, 3);

    service.shutdown().await.unwrap();
}
