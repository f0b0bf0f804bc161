use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one exam attempt. Assigned by the exam storage layer;
/// must not be reused while monitor state for the old attempt exists.
pub type SessionId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    VoiceDetected,
    SustainedNoise,
    NoFaceDetected,
    MultipleFaces,
    LookingAway,
    PhoneUsage,
    HelpRequest,
    TabSwitch,
    WindowBlur,
    CameraIssue,
    ManualFlag,
    AutoSubmit,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::VoiceDetected => "voice_detected",
            ViolationKind::SustainedNoise => "sustained_noise",
            ViolationKind::NoFaceDetected => "no_face_detected",
            ViolationKind::MultipleFaces => "multiple_faces",
            ViolationKind::LookingAway => "looking_away",
            ViolationKind::PhoneUsage => "phone_usage",
            ViolationKind::HelpRequest => "help_request",
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::WindowBlur => "window_blur",
            ViolationKind::CameraIssue => "camera_issue",
            ViolationKind::ManualFlag => "manual_flag",
            ViolationKind::AutoSubmit => "auto_submit",
        }
    }

    /// Severity an alert of this kind carries unless the classifier
    /// escalates it (window blur repeats, for example).
    pub fn default_severity(&self) -> Severity {
        match self {
            ViolationKind::VoiceDetected => Severity::Medium,
            ViolationKind::SustainedNoise => Severity::High,
            ViolationKind::NoFaceDetected => Severity::High,
            ViolationKind::MultipleFaces => Severity::Critical,
            ViolationKind::LookingAway => Severity::Medium,
            ViolationKind::PhoneUsage => Severity::Critical,
            ViolationKind::HelpRequest => Severity::Low,
            ViolationKind::TabSwitch => Severity::High,
            ViolationKind::WindowBlur => Severity::Medium,
            ViolationKind::CameraIssue => Severity::High,
            ViolationKind::ManualFlag => Severity::Medium,
            ViolationKind::AutoSubmit => Severity::Medium,
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory detection of a possible integrity violation. Produced by the
/// classifiers, consumed by the cooldown gate; never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCandidate {
    pub session_id: SessionId,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    /// Numeric evidence where the classifier has one (audio level,
    /// above-threshold ratio, repeat count).
    pub evidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ViolationCandidate {
    pub fn new(
        session_id: SessionId,
        kind: ViolationKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            kind,
            severity: kind.default_severity(),
            description: description.into(),
            evidence: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_evidence(mut self, evidence: f64) -> Self {
        self.evidence = Some(evidence);
        self
    }
}

/// Persisted alert record. `session_id` is None for issues raised before a
/// session exists (camera failures during setup).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub session_id: Option<SessionId>,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub evidence_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusEventType {
    TabSwitch,
    WindowBlur,
    WindowFocus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: FocusEventType,
}

/// Per-frame results from the external face/gaze/hand detectors. A `None`
/// field means the detector could not classify the frame; that is treated
/// as "no violation", never as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSignals {
    pub face_count: Option<u32>,
    pub is_looking_at_screen: Option<bool>,
    pub phone_detected: bool,
    pub raised_hand_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // The dashboard and webhook consumers read these as JSON; the wire
    // shape (snake_case kinds, camelCase fields) is part of the contract.
    #[test]
    fn candidate_json_shape() {
        let candidate = ViolationCandidate::new(42, ViolationKind::TabSwitch, "switched tabs")
            .with_evidence(3.0);
        let value = serde_json::to_value(&candidate).unwrap();

        assert_eq!(value["sessionId"], 42);
        assert_eq!(value["kind"], "tab_switch");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["evidence"], 3.0);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn alert_json_shape() {
        let alert = Alert {
            id: Uuid::new_v4(),
            session_id: None,
            kind: ViolationKind::CameraIssue,
            severity: ViolationKind::CameraIssue.default_severity(),
            description: "camera unavailable before exam".into(),
            evidence_path: None,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&alert).unwrap();

        assert_eq!(value["kind"], "camera_issue");
        assert_eq!(value["severity"], "high");
        // Pre-exam issues carry no session
        assert!(value["sessionId"].is_null());
    }

    #[test]
    fn focus_event_round_trips() {
        let event = FocusEvent {
            timestamp: Utc::now(),
            event_type: FocusEventType::WindowBlur,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"window_blur\""));

        let back: FocusEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type, FocusEventType::WindowBlur);
    }
}
