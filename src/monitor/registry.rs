use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::info;

use crate::alert::ViolationSink;
use crate::config::MonitorConfig;
use crate::types::SessionId;

use super::Monitor;

/// Owns the live monitors of one flavor, keyed by session. The lock
/// guards the map only; monitor-internal state is each monitor's own
/// business, and `stop()` is always awaited outside the lock so a slow
/// teardown never blocks other sessions.
pub struct MonitorRegistry<M: Monitor> {
    config: Arc<MonitorConfig>,
    sink: ViolationSink,
    sessions: Mutex<HashMap<SessionId, Arc<M>>>,
}

impl<M: Monitor> MonitorRegistry<M> {
    pub fn new(config: Arc<MonitorConfig>, sink: ViolationSink) -> Self {
        Self {
            config,
            sink,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Construct and start a monitor for the session. No-op if one is
    /// already registered.
    pub fn start_session(&self, session_id: SessionId) {
        let monitor = {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(&session_id) {
                return;
            }
            let monitor = Arc::new(M::new(
                session_id,
                Arc::clone(&self.config),
                self.sink.clone(),
            ));
            sessions.insert(session_id, Arc::clone(&monitor));
            monitor
        };

        monitor.start();
        info!("monitoring started for session {session_id}");
    }

    /// Remove the session's monitor and stop it. Returns whether a
    /// monitor existed. After this returns, no further candidate for the
    /// session leaves this registry and its memory is reclaimed.
    pub async fn stop_session(&self, session_id: SessionId) -> Result<bool> {
        let removed = {
            let mut sessions = lock(&self.sessions);
            sessions.remove(&session_id)
        };

        match removed {
            Some(monitor) => {
                monitor.stop().await?;
                info!("monitoring stopped for session {session_id}");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn get(&self, session_id: SessionId) -> Option<Arc<M>> {
        lock(&self.sessions).get(&session_id).cloned()
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        lock(&self.sessions).contains_key(&session_id)
    }

    pub fn status(&self, session_id: SessionId) -> Option<M::Status> {
        self.get(session_id).map(|monitor| monitor.status())
    }

    pub fn all_statuses(&self) -> HashMap<SessionId, M::Status> {
        let monitors: Vec<Arc<M>> = lock(&self.sessions).values().cloned().collect();
        monitors
            .into_iter()
            .map(|monitor| (monitor.session_id(), monitor.status()))
            .collect()
    }

    /// Stop every remaining session. Used at process shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        let drained: Vec<Arc<M>> = {
            let mut sessions = lock(&self.sessions);
            sessions.drain().map(|(_, monitor)| monitor).collect()
        };

        for monitor in drained {
            monitor.stop().await?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{AudioSessionMonitor, ScreenSessionMonitor};
    use pretty_assertions::assert_eq;

    fn registry<M: Monitor>() -> MonitorRegistry<M> {
        let (sink, _rx) = ViolationSink::disconnected(8);
        MonitorRegistry::new(Arc::new(MonitorConfig::default()), sink)
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let registry = registry::<ScreenSessionMonitor>();
        registry.start_session(1);

        let monitor = registry.get(1).unwrap();
        monitor.tab_switch();

        // A second start must not replace the existing monitor
        registry.start_session(1);
        assert_eq!(registry.status(1).unwrap().total_tab_switches, 1);
    }

    #[tokio::test]
    async fn stop_removes_and_reports() {
        let registry = registry::<AudioSessionMonitor>();
        registry.start_session(1);
        assert!(registry.contains(1));

        assert!(registry.stop_session(1).await.unwrap());
        assert!(!registry.contains(1));
        assert!(registry.status(1).is_none());

        // Stopping again is a harmless no-op
        assert!(!registry.stop_session(1).await.unwrap());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = registry::<ScreenSessionMonitor>();
        registry.start_session(1);
        registry.start_session(2);

        registry.get(1).unwrap().tab_switch();

        assert_eq!(registry.status(1).unwrap().total_tab_switches, 1);
        assert_eq!(registry.status(2).unwrap().total_tab_switches, 0);
        assert_eq!(registry.all_statuses().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_sweeps_everything() {
        let registry = registry::<AudioSessionMonitor>();
        for id in 1..=4 {
            registry.start_session(id);
        }

        registry.shutdown().await.unwrap();
        assert!(registry.all_statuses().is_empty());
    }
}
