//! Pure signal classifiers. Each function maps one sample, window or
//! frame result to an optional violation candidate; no locking, no I/O.

use crate::types::{FocusEventType, SessionId, Severity, ViolationCandidate, ViolationKind};

/// RMS level of a PCM16-LE chunk, normalized to [0, 1]. A malformed chunk
/// (empty, or an odd byte count) is treated as silence rather than an
/// error; the trailing odd byte of an otherwise valid chunk is dropped.
pub fn audio_level(raw: &[u8]) -> f32 {
    if raw.len() < 2 {
        return 0.0;
    }

    let mut sum_squares = 0.0f64;
    let mut count = 0usize;
    for pair in raw.chunks_exact(2) {
        let sample = i16::from_le_bytes([pair[0], pair[1]]) as f64;
        sum_squares += sample * sample;
        count += 1;
    }

    let rms = (sum_squares / count as f64).sqrt();
    (rms / 32768.0) as f32
}

/// Single-sample voice check: admits when `level > threshold`.
pub fn classify_audio_sample(
    session_id: SessionId,
    level: f32,
    threshold: f32,
) -> Option<ViolationCandidate> {
    if level > threshold {
        Some(
            ViolationCandidate::new(
                session_id,
                ViolationKind::VoiceDetected,
                format!("audio level {level:.2} above threshold {threshold:.2}"),
            )
            .with_evidence(level as f64),
        )
    } else {
        None
    }
}

/// Sustained-noise check over a window snapshot. A single loud sample is
/// noise; a majority of loud samples over the window indicates ongoing
/// background conversation. Empty windows never flag.
pub fn classify_audio_window(
    session_id: SessionId,
    samples: &[f32],
    threshold: f32,
    ratio_threshold: f32,
) -> Option<ViolationCandidate> {
    if samples.is_empty() {
        return None;
    }

    let above = samples.iter().filter(|&&v| v > threshold).count();
    let ratio = above as f32 / samples.len() as f32;
    if ratio > ratio_threshold {
        Some(
            ViolationCandidate::new(
                session_id,
                ViolationKind::SustainedNoise,
                format!(
                    "{:.0}% of the last {} audio samples above threshold",
                    ratio * 100.0,
                    samples.len()
                ),
            )
            .with_evidence(ratio as f64),
        )
    } else {
        None
    }
}

/// Face-count check on an externally classified frame.
pub fn classify_face_count(session_id: SessionId, count: u32) -> Option<ViolationCandidate> {
    match count {
        0 => Some(ViolationCandidate::new(
            session_id,
            ViolationKind::NoFaceDetected,
            "no face detected in frame",
        )),
        1 => None,
        n => Some(
            ViolationCandidate::new(
                session_id,
                ViolationKind::MultipleFaces,
                format!("{n} faces detected in frame"),
            )
            .with_evidence(n as f64),
        ),
    }
}

pub fn classify_gaze(
    session_id: SessionId,
    is_looking_at_screen: bool,
) -> Option<ViolationCandidate> {
    if is_looking_at_screen {
        None
    } else {
        Some(ViolationCandidate::new(
            session_id,
            ViolationKind::LookingAway,
            "student looking away from screen",
        ))
    }
}

pub fn classify_phone(session_id: SessionId, phone_detected: bool) -> Option<ViolationCandidate> {
    if phone_detected {
        Some(ViolationCandidate::new(
            session_id,
            ViolationKind::PhoneUsage,
            "phone usage detected during exam",
        ))
    } else {
        None
    }
}

pub fn classify_hand_raise(
    session_id: SessionId,
    raised_hand_detected: bool,
) -> Option<ViolationCandidate> {
    if raised_hand_detected {
        Some(ViolationCandidate::new(
            session_id,
            ViolationKind::HelpRequest,
            "student raised hand requesting help",
        ))
    } else {
        None
    }
}

/// Focus-event check. Tab switches always flag; window blurs always flag
/// with severity escalating once the repeat count passes `escalation`;
/// focus regains never flag.
pub fn classify_focus_event(
    session_id: SessionId,
    event_type: FocusEventType,
    repeat_count: u32,
    escalation: u32,
) -> Option<ViolationCandidate> {
    match event_type {
        FocusEventType::TabSwitch => Some(
            ViolationCandidate::new(
                session_id,
                ViolationKind::TabSwitch,
                format!("student switched tabs or lost focus ({repeat_count} total)"),
            )
            .with_evidence(repeat_count as f64),
        ),
        FocusEventType::WindowBlur => {
            let severity = if repeat_count > escalation {
                Severity::High
            } else {
                Severity::Medium
            };
            Some(
                ViolationCandidate::new(
                    session_id,
                    ViolationKind::WindowBlur,
                    format!("exam window lost focus ({repeat_count} total)"),
                )
                .with_severity(severity)
                .with_evidence(repeat_count as f64),
            )
        }
        FocusEventType::WindowFocus => None,
    }
}
