use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::alert::ViolationSink;
use crate::classify::{audio_level, classify_audio_sample, classify_audio_window};
use crate::config::MonitorConfig;
use crate::types::SessionId;
use crate::window::RollingWindow;

use super::Monitor;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStatus {
    pub session_id: SessionId,
    pub is_running: bool,
    pub samples_seen: u64,
    pub candidates_emitted: u64,
    pub window_average: f32,
    pub window_ratio_above_threshold: f32,
    pub recent_levels: Vec<f32>,
}

struct AudioState {
    window: RollingWindow,
    recent_levels: VecDeque<f32>,
    samples_seen: u64,
    candidates_emitted: u64,
    running: bool,
}

/// Audio flavor of the session monitor. Ingest calls classify each chunk
/// immediately; a periodic background task re-evaluates the rolling
/// window for sustained noise.
pub struct AudioSessionMonitor {
    session_id: SessionId,
    config: Arc<MonitorConfig>,
    sink: ViolationSink,
    state: Arc<Mutex<AudioState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AudioSessionMonitor {
    /// Compute the chunk's normalized level, record it, and run the
    /// single-sample classifier. Returns whether a candidate was produced
    /// (not whether an alert survives the cooldown gate downstream) and
    /// the level itself.
    pub fn ingest_audio_chunk(&self, raw: &[u8]) -> (bool, f32) {
        let level = audio_level(raw);

        let candidate = {
            let mut state = lock(&self.state);
            state.window.push(level);
            if state.recent_levels.len() >= self.config.recent_levels.max(1) {
                state.recent_levels.pop_front();
            }
            state.recent_levels.push_back(level);
            state.samples_seen += 1;

            let candidate =
                classify_audio_sample(self.session_id, level, self.config.audio_threshold);
            if candidate.is_some() {
                state.candidates_emitted += 1;
            }
            candidate
        };

        // Handoff happens outside the state lock
        match candidate {
            Some(candidate) => {
                self.sink.push(candidate);
                (true, level)
            }
            None => (false, level),
        }
    }
}

impl Monitor for AudioSessionMonitor {
    type Status = AudioStatus;

    fn new(session_id: SessionId, config: Arc<MonitorConfig>, sink: ViolationSink) -> Self {
        let state = AudioState {
            window: RollingWindow::new(config.window_capacity),
            recent_levels: VecDeque::with_capacity(config.recent_levels),
            samples_seen: 0,
            candidates_emitted: 0,
            running: false,
        };

        Self {
            session_id,
            config,
            sink,
            state: Arc::new(Mutex::new(state)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    fn start(&self) {
        // A stopped monitor stays stopped; the token never un-cancels
        if self.cancel.is_cancelled() {
            return;
        }

        let mut task = lock(&self.task);
        if task.is_some() {
            return;
        }

        lock(&self.state).running = true;

        let handle = tokio::spawn(evaluation_loop(
            self.session_id,
            Arc::clone(&self.config),
            Arc::clone(&self.state),
            self.sink.clone(),
            self.cancel.clone(),
        ));
        *task = Some(handle);
    }

    async fn stop(&self) -> Result<()> {
        self.cancel.cancel();

        let handle = lock(&self.task).take();
        {
            let mut state = lock(&self.state);
            state.running = false;
        }

        if let Some(mut handle) = handle {
            match timeout(self.config.stop_wait, &mut handle).await {
                Ok(join_result) => {
                    join_result.context("audio evaluation task failed to join")?;
                }
                Err(_) => {
                    // The task must not outlive stop(); kill it rather
                    // than detach it
                    handle.abort();
                    warn!(
                        "audio evaluation task for session {} did not exit within {:?}, aborted",
                        self.session_id, self.config.stop_wait
                    );
                }
            }
        }
        Ok(())
    }

    fn status(&self) -> AudioStatus {
        let state = lock(&self.state);
        AudioStatus {
            session_id: self.session_id,
            is_running: state.running,
            samples_seen: state.samples_seen,
            candidates_emitted: state.candidates_emitted,
            window_average: state.window.average(),
            window_ratio_above_threshold: state.window.ratio_above(self.config.audio_threshold),
            recent_levels: state.recent_levels.iter().copied().collect(),
        }
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// Wakes every `window_seconds`, snapshots the window and fires a
/// sustained-noise candidate when the loud-sample ratio crosses the
/// configured threshold. Cancellation is observed both while sleeping
/// and right after waking.
async fn evaluation_loop(
    session_id: SessionId,
    config: Arc<MonitorConfig>,
    state: Arc<Mutex<AudioState>>,
    sink: ViolationSink,
    cancel: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(config.window_seconds.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so evaluations
    // start one window after start()
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if cancel.is_cancelled() {
                    break;
                }

                let samples = lock(&state).window.snapshot();

                if let Some(candidate) = classify_audio_window(
                    session_id,
                    &samples,
                    config.audio_threshold,
                    config.sustained_ratio_threshold,
                ) {
                    lock(&state).candidates_emitted += 1;
                    sink.push(candidate);
                }
            }
            _ = cancel.cancelled() => {
                debug!("audio evaluation loop for session {session_id} shutting down");
                break;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
