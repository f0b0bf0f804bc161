use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::alert::{AlertDispatcher, AlertStore, CooldownGate, DispatchPipeline, ViolationSink};
use crate::classify::{classify_face_count, classify_gaze, classify_hand_raise, classify_phone};
use crate::config::MonitorConfig;
use crate::monitor::{
    AudioSessionMonitor, AudioStatus, MonitorRegistry, ScreenSessionMonitor, ScreenStatus,
};
use crate::types::{FrameSignals, SessionId};

/// Combined dashboard snapshot for one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub audio: Option<AudioStatus>,
    pub screen: Option<ScreenStatus>,
}

/// Facade wiring the whole monitoring core together: one audio registry,
/// one screen registry, the cooldown gate and the dispatch pipeline over
/// a shared alert store. The embedding HTTP layer owns exactly one of
/// these and injects it wherever requests are served.
pub struct ProctorService {
    config: Arc<MonitorConfig>,
    gate: Arc<CooldownGate>,
    pipeline: DispatchPipeline,
    sink: ViolationSink,
    audio: MonitorRegistry<AudioSessionMonitor>,
    screen: MonitorRegistry<ScreenSessionMonitor>,
}

impl ProctorService {
    /// Must be called from within a tokio runtime; the dispatch workers
    /// are spawned here.
    pub fn new(config: MonitorConfig, store: Arc<dyn AlertStore>) -> Self {
        let config = Arc::new(config);
        let gate = Arc::new(CooldownGate::new(Arc::clone(&config)));
        let dispatcher = Arc::new(AlertDispatcher::new(Arc::clone(&gate), store));
        let pipeline = DispatchPipeline::new(dispatcher, &config);
        let sink = pipeline.sink();

        Self {
            audio: MonitorRegistry::new(Arc::clone(&config), sink.clone()),
            screen: MonitorRegistry::new(Arc::clone(&config), sink.clone()),
            config,
            gate,
            pipeline,
            sink,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Begin monitoring an exam attempt: cooldown state first, then both
    /// monitor flavors. No-op for an already active session.
    pub fn start_session(&self, session_id: SessionId) {
        if self.audio.contains(session_id) || self.screen.contains(session_id) {
            return;
        }

        self.gate.register_session(session_id);
        self.audio.start_session(session_id);
        self.screen.start_session(session_id);
        info!("session {session_id} under live monitoring");
    }

    /// End monitoring: both monitors stopped (bounded wait), cooldown
    /// state freed. Candidates still queued for the session are refused
    /// by the gate afterwards, so no alert can appear post-teardown.
    pub async fn stop_session(&self, session_id: SessionId) -> Result<bool> {
        let had_audio = self.audio.stop_session(session_id).await?;
        let had_screen = self.screen.stop_session(session_id).await?;
        self.gate.clear_session(session_id);

        Ok(had_audio || had_screen)
    }

    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.audio.contains(session_id) || self.screen.contains(session_id)
    }

    /// Route a raw PCM16 chunk to the session's audio monitor. Returns
    /// (candidate produced, normalized level), or None for an unknown
    /// session.
    pub fn ingest_audio_chunk(&self, session_id: SessionId, raw: &[u8]) -> Option<(bool, f32)> {
        self.audio
            .get(session_id)
            .map(|monitor| monitor.ingest_audio_chunk(raw))
    }

    pub fn tab_switch(&self, session_id: SessionId) {
        if let Some(monitor) = self.screen.get(session_id) {
            monitor.tab_switch();
        }
    }

    pub fn window_blur(&self, session_id: SessionId) {
        if let Some(monitor) = self.screen.get(session_id) {
            monitor.window_blur();
        }
    }

    pub fn window_focus(&self, session_id: SessionId) {
        if let Some(monitor) = self.screen.get(session_id) {
            monitor.window_focus();
        }
    }

    /// Feed externally classified per-frame results through the frame
    /// classifiers. Detector-unavailable fields (None) are treated as no
    /// violation; a dead camera is reported by the video layer itself.
    pub fn process_frame(&self, session_id: SessionId, signals: FrameSignals) {
        if !self.is_active(session_id) {
            return;
        }

        let candidates = [
            signals
                .face_count
                .and_then(|count| classify_face_count(session_id, count)),
            signals
                .is_looking_at_screen
                .and_then(|looking| classify_gaze(session_id, looking)),
            classify_phone(session_id, signals.phone_detected),
            classify_hand_raise(session_id, signals.raised_hand_detected),
        ];

        for candidate in candidates.into_iter().flatten() {
            self.sink.push(candidate);
        }
    }

    pub fn status(&self, session_id: SessionId) -> Option<SessionStatus> {
        let audio = self.audio.status(session_id);
        let screen = self.screen.status(session_id);
        if audio.is_none() && screen.is_none() {
            return None;
        }
        Some(SessionStatus {
            session_id,
            audio,
            screen,
        })
    }

    pub fn all_statuses(&self) -> HashMap<SessionId, SessionStatus> {
        let mut combined: HashMap<SessionId, SessionStatus> = HashMap::new();

        for (session_id, audio) in self.audio.all_statuses() {
            combined
                .entry(session_id)
                .or_insert_with(|| SessionStatus {
                    session_id,
                    audio: None,
                    screen: None,
                })
                .audio = Some(audio);
        }
        for (session_id, screen) in self.screen.all_statuses() {
            combined
                .entry(session_id)
                .or_insert_with(|| SessionStatus {
                    session_id,
                    audio: None,
                    screen: None,
                })
                .screen = Some(screen);
        }

        combined
    }

    /// Tear down every session and the dispatch workers.
    pub async fn shutdown(&self) -> Result<()> {
        self.audio.shutdown().await?;
        self.screen.shutdown().await?;
        self.pipeline.shutdown().await?;
        Ok(())
    }
}
