use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::time::Instant;

use crate::config::MonitorConfig;
use crate::types::{SessionId, ViolationKind};

/// Outcome of a cooldown check. `Admitted` carries the timestamp that was
/// written and the one it replaced, so a failed persist can be rolled
/// back without spending the cooldown slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted {
        previous: Option<Instant>,
        written: Instant,
    },
    Suppressed,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted { .. })
    }
}

/// Per-(session, kind) suppression window. The admission check and the
/// timestamp update happen under one lock acquisition, so two concurrent
/// candidates for the same pair can never both pass inside one interval.
pub struct CooldownGate {
    config: Arc<MonitorConfig>,
    sessions: Mutex<HashMap<SessionId, HashMap<ViolationKind, Instant>>>,
}

impl CooldownGate {
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Call exactly once when an exam session starts.
    pub fn register_session(&self, session_id: SessionId) {
        let mut sessions = lock(&self.sessions);
        sessions.entry(session_id).or_default();
    }

    /// Call exactly once when an exam session ends. Candidates still in
    /// flight for the session are refused from this point on.
    pub fn clear_session(&self, session_id: SessionId) {
        let mut sessions = lock(&self.sessions);
        sessions.remove(&session_id);
    }

    pub fn is_registered(&self, session_id: SessionId) -> bool {
        lock(&self.sessions).contains_key(&session_id)
    }

    /// Check-and-set: admits and records the timestamp in one step.
    /// Unregistered sessions are always refused; zero-cooldown kinds
    /// always admit.
    pub fn admit(&self, session_id: SessionId, kind: ViolationKind) -> Admission {
        let cooldown = self.config.cooldown_for(kind);
        let now = Instant::now();

        let mut sessions = lock(&self.sessions);
        let Some(kinds) = sessions.get_mut(&session_id) else {
            debug!("refusing {kind} for unregistered session {session_id}");
            return Admission::Suppressed;
        };

        if cooldown.is_zero() {
            let previous = kinds.insert(kind, now);
            return Admission::Admitted {
                previous,
                written: now,
            };
        }

        match kinds.get(&kind) {
            Some(last) if now.duration_since(*last) < cooldown => Admission::Suppressed,
            _ => {
                let previous = kinds.insert(kind, now);
                Admission::Admitted {
                    previous,
                    written: now,
                }
            }
        }
    }

    /// Restore the pre-admission timestamp after a failed persist, so the
    /// next legitimate candidate of this kind is not needlessly suppressed.
    /// Compare-and-restore: if a later admission has already replaced
    /// `written`, its newer timestamp stays untouched.
    pub fn rollback(
        &self,
        session_id: SessionId,
        kind: ViolationKind,
        previous: Option<Instant>,
        written: Instant,
    ) {
        let mut sessions = lock(&self.sessions);
        if let Some(kinds) = sessions.get_mut(&session_id) {
            if kinds.get(&kind) != Some(&written) {
                return;
            }
            match previous {
                Some(instant) => {
                    kinds.insert(kind, instant);
                }
                None => {
                    kinds.remove(&kind);
                }
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
