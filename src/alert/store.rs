use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Alert, SessionId, Severity, ViolationKind};

/// Fields of an alert before storage assigns it an id.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub session_id: Option<SessionId>,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub evidence_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persistence boundary for alerts. Implementations must be callable from
/// a dispatch worker; failures are returned, never panicked.
pub trait AlertStore: Send + Sync {
    fn create_alert(&self, alert: NewAlert) -> Result<Alert, StoreError>;

    fn alerts_for_session(&self, session_id: SessionId) -> Vec<Alert>;

    /// Most recent alerts across all sessions, newest first.
    fn recent_alerts(&self, limit: usize) -> Vec<Alert>;
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

/// Reference store keeping alerts in memory. Production deployments wire
/// a database-backed implementation instead.
#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self, session_id: SessionId) -> AlertSummary {
        let alerts = self.alerts_for_session(session_id);
        let mut summary = AlertSummary {
            total: alerts.len(),
            ..Default::default()
        };
        for alert in &alerts {
            match alert.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    /// 100 minus 10 per alert, floored at 0.
    pub fn integrity_score(&self, session_id: SessionId) -> u32 {
        let count = self.alerts_for_session(session_id).len() as u32;
        100u32.saturating_sub(count * 10)
    }
}

impl AlertStore for InMemoryAlertStore {
    fn create_alert(&self, alert: NewAlert) -> Result<Alert, StoreError> {
        let record = Alert {
            id: Uuid::new_v4(),
            session_id: alert.session_id,
            kind: alert.kind,
            severity: alert.severity,
            description: alert.description,
            evidence_path: alert.evidence_path,
            timestamp: alert.timestamp,
        };

        let mut alerts = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        alerts.push(record.clone());
        Ok(record)
    }

    fn alerts_for_session(&self, session_id: SessionId) -> Vec<Alert> {
        let alerts = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        alerts
            .iter()
            .filter(|a| a.session_id == Some(session_id))
            .cloned()
            .collect()
    }

    fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        let alerts = match self.alerts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        alerts.iter().rev().take(limit).cloned().collect()
    }
}
