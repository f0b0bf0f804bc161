use std::time::Duration;

use log::warn;

use crate::types::ViolationKind;

/// Configuration for the monitoring core with tunable thresholds.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Normalized audio level above which a single sample counts as voice
    pub audio_threshold: f32,

    /// Seconds between background evaluations of the audio window
    pub window_seconds: u64,

    /// Maximum samples kept in the audio rolling window
    pub window_capacity: usize,

    /// Fraction of above-threshold samples that flags sustained noise
    pub sustained_ratio_threshold: f32,

    /// Tab switches before the dashboard marks the session suspicious
    pub tab_switch_threshold: u32,

    /// Window-blur repeats after which blur severity escalates to high
    pub blur_escalation_threshold: u32,

    /// Audio levels kept for status display
    pub recent_levels: usize,

    /// Focus events returned in a status snapshot
    pub recent_events: usize,

    /// Hard cap on the per-session focus event history
    pub event_history_cap: usize,

    /// Bound on how long `stop()` waits for a background task to exit
    pub stop_wait: Duration,

    /// Capacity of the violation dispatch queue
    pub dispatch_queue_capacity: usize,

    /// Number of dispatch workers draining that queue
    pub dispatch_workers: usize,

    /// Cooldown for kinds without a specific entry below
    pub default_cooldown: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            audio_threshold: 0.5,
            window_seconds: 3,
            window_capacity: 50,
            sustained_ratio_threshold: 0.4,
            tab_switch_threshold: 3,
            blur_escalation_threshold: 5,
            recent_levels: 10,
            recent_events: 20,
            event_history_cap: 500,
            stop_wait: Duration::from_secs(3),
            dispatch_queue_capacity: 64,
            dispatch_workers: 2,
            default_cooldown: Duration::from_secs(20),
        }
    }
}

impl MonitorConfig {
    /// Defaults overridden by `EXAMGUARD_*` environment variables where set.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(value) = env_parse::<f32>("EXAMGUARD_AUDIO_THRESHOLD") {
            config.audio_threshold = value;
        }
        if let Some(value) = env_parse::<u64>("EXAMGUARD_WINDOW_SECONDS") {
            config.window_seconds = value.max(1);
        }
        if let Some(value) = env_parse::<u32>("EXAMGUARD_TAB_SWITCH_THRESHOLD") {
            config.tab_switch_threshold = value;
        }

        config
    }

    /// Minimum spacing between two persisted alerts of `kind` for one
    /// session. Zero means the kind always admits.
    pub fn cooldown_for(&self, kind: ViolationKind) -> Duration {
        match kind {
            ViolationKind::NoFaceDetected => Duration::from_secs(15),
            ViolationKind::MultipleFaces => Duration::from_secs(10),
            ViolationKind::LookingAway => Duration::from_secs(30),
            ViolationKind::PhoneUsage => Duration::from_secs(20),
            ViolationKind::VoiceDetected => Duration::from_secs(20),
            ViolationKind::SustainedNoise => Duration::from_secs(20),
            // One-shot kinds are always significant
            ViolationKind::HelpRequest
            | ViolationKind::TabSwitch
            | ViolationKind::ManualFlag
            | ViolationKind::AutoSubmit
            | ViolationKind::CameraIssue => Duration::ZERO,
            ViolationKind::WindowBlur => self.default_cooldown,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {name}='{raw}'");
            None
        }
    }
}
