use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;

use crate::alert::ViolationSink;
use crate::classify::classify_focus_event;
use crate::config::MonitorConfig;
use crate::types::{FocusEvent, FocusEventType, SessionId};

use super::Monitor;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenStatus {
    pub session_id: SessionId,
    pub total_tab_switches: u32,
    pub total_window_blurs: u32,
    pub is_focused: bool,
    /// True once tab switches reach the configured threshold; the
    /// dashboard highlights the session.
    pub is_suspicious: bool,
    pub total_focus_lost_seconds: f64,
    pub focus_lost_count: u32,
    pub recent_events: Vec<FocusEvent>,
}

struct ScreenState {
    events: VecDeque<FocusEvent>,
    tab_switch_count: u32,
    window_blur_count: u32,
    is_focused: bool,
    last_focus_change: Instant,
    focus_lost_seconds: f64,
}

/// Screen/focus flavor of the session monitor. Purely event-driven: no
/// background task, every ingest call classifies immediately.
pub struct ScreenSessionMonitor {
    session_id: SessionId,
    config: Arc<MonitorConfig>,
    sink: ViolationSink,
    state: Mutex<ScreenState>,
}

impl ScreenSessionMonitor {
    /// The student switched to another browser tab. Always produces a
    /// candidate; the running count rides along as evidence.
    pub fn tab_switch(&self) {
        let now = Instant::now();
        let count = {
            let mut state = lock(&self.state);
            state.tab_switch_count += 1;
            state.mark_unfocused(now);
            state.append_event(FocusEventType::TabSwitch, self.config.event_history_cap);
            state.tab_switch_count
        };

        // Classification and handoff happen outside the lock
        if let Some(candidate) = classify_focus_event(
            self.session_id,
            FocusEventType::TabSwitch,
            count,
            self.config.blur_escalation_threshold,
        ) {
            self.sink.push(candidate);
        }
    }

    /// The exam window lost focus (alt-tab and similar). Severity
    /// escalates once the repeat count passes the configured threshold.
    pub fn window_blur(&self) {
        let now = Instant::now();
        let count = {
            let mut state = lock(&self.state);
            state.window_blur_count += 1;
            state.mark_unfocused(now);
            state.append_event(FocusEventType::WindowBlur, self.config.event_history_cap);
            state.window_blur_count
        };

        if let Some(candidate) = classify_focus_event(
            self.session_id,
            FocusEventType::WindowBlur,
            count,
            self.config.blur_escalation_threshold,
        ) {
            self.sink.push(candidate);
        }
    }

    /// Focus returned to the exam window. Closes an open focus-lost
    /// interval and accumulates its duration; reporting only, never a
    /// candidate.
    pub fn window_focus(&self) {
        let now = Instant::now();
        let mut state = lock(&self.state);
        if !state.is_focused {
            state.focus_lost_seconds += now.duration_since(state.last_focus_change).as_secs_f64();
        }
        state.is_focused = true;
        state.last_focus_change = now;
        state.append_event(FocusEventType::WindowFocus, self.config.event_history_cap);
    }
}

impl ScreenState {
    fn mark_unfocused(&mut self, now: Instant) {
        if self.is_focused {
            self.last_focus_change = now;
        }
        self.is_focused = false;
    }

    fn append_event(&mut self, event_type: FocusEventType, cap: usize) {
        if self.events.len() >= cap.max(1) {
            self.events.pop_front();
        }
        self.events.push_back(FocusEvent {
            timestamp: Utc::now(),
            event_type,
        });
    }
}

impl Monitor for ScreenSessionMonitor {
    type Status = ScreenStatus;

    fn new(session_id: SessionId, config: Arc<MonitorConfig>, sink: ViolationSink) -> Self {
        Self {
            session_id,
            config,
            sink,
            state: Mutex::new(ScreenState {
                events: VecDeque::new(),
                tab_switch_count: 0,
                window_blur_count: 0,
                is_focused: true,
                last_focus_change: Instant::now(),
                focus_lost_seconds: 0.0,
            }),
        }
    }

    fn start(&self) {
        // Event-driven: nothing to spawn
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    fn status(&self) -> ScreenStatus {
        let state = lock(&self.state);
        let recent = self.config.recent_events.max(1);
        let skip = state.events.len().saturating_sub(recent);
        ScreenStatus {
            session_id: self.session_id,
            total_tab_switches: state.tab_switch_count,
            total_window_blurs: state.window_blur_count,
            is_focused: state.is_focused,
            is_suspicious: state.tab_switch_count >= self.config.tab_switch_threshold,
            total_focus_lost_seconds: state.focus_lost_seconds,
            focus_lost_count: state.tab_switch_count + state.window_blur_count,
            recent_events: state.events.iter().skip(skip).cloned().collect(),
        }
    }

    fn session_id(&self) -> SessionId {
        self.session_id
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
