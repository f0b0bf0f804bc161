use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::alert::cooldown::{Admission, CooldownGate};
use crate::alert::store::{AlertStore, NewAlert};
use crate::config::MonitorConfig;
use crate::types::{Alert, ViolationCandidate};

/// Handoff from the monitors into the dispatch queue. `push` never blocks
/// the ingest path: a full queue drops the candidate with a warning.
#[derive(Clone)]
pub struct ViolationSink {
    tx: mpsc::Sender<ViolationCandidate>,
}

impl ViolationSink {
    pub fn push(&self, candidate: ViolationCandidate) {
        match self.tx.try_send(candidate) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "dispatch queue full, dropping {} candidate for session {}",
                    dropped.kind, dropped.session_id
                );
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                debug!(
                    "dispatch queue closed, dropping {} candidate for session {}",
                    dropped.kind, dropped.session_id
                );
            }
        }
    }

    /// Sink whose queue is never drained; candidates beyond the buffer
    /// are dropped. Intended for monitor tests that only care about
    /// ingest behavior.
    #[cfg(test)]
    pub(crate) fn disconnected(buffer: usize) -> (Self, mpsc::Receiver<ViolationCandidate>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

/// Turns admitted candidates into persisted alerts. Admission and
/// persistence are ordered so a failed persist never spends the cooldown
/// slot: admit, attempt the write, roll the timestamp back on error.
pub struct AlertDispatcher {
    gate: Arc<CooldownGate>,
    store: Arc<dyn AlertStore>,
}

impl AlertDispatcher {
    pub fn new(gate: Arc<CooldownGate>, store: Arc<dyn AlertStore>) -> Self {
        Self { gate, store }
    }

    /// None means either suppression (steady state under repeated
    /// violations) or a persistence failure (logged).
    pub fn create(&self, candidate: &ViolationCandidate) -> Option<Alert> {
        let (previous, written) = match self.gate.admit(candidate.session_id, candidate.kind) {
            Admission::Admitted { previous, written } => (previous, written),
            Admission::Suppressed => return None,
        };

        let record = NewAlert {
            session_id: Some(candidate.session_id),
            kind: candidate.kind,
            severity: candidate.severity,
            description: candidate.description.clone(),
            evidence_path: None,
            timestamp: candidate.timestamp,
        };

        match self.store.create_alert(record) {
            Ok(alert) => {
                info!(
                    "alert {} ({}) created for session {}",
                    alert.id, alert.kind, candidate.session_id
                );
                Some(alert)
            }
            Err(err) => {
                error!(
                    "failed to persist {} alert for session {}: {err}",
                    candidate.kind, candidate.session_id
                );
                self.gate
                    .rollback(candidate.session_id, candidate.kind, previous, written);
                None
            }
        }
    }
}

/// Bounded queue plus a small worker pool draining it. Replaces
/// thread-per-violation callback delivery: ingestion stays non-blocking
/// while a violation storm is capped by the queue instead of spawning
/// unbounded tasks.
pub struct DispatchPipeline {
    tx: mpsc::Sender<ViolationCandidate>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stop_wait: std::time::Duration,
}

impl DispatchPipeline {
    pub fn new(dispatcher: Arc<AlertDispatcher>, config: &MonitorConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.dispatch_queue_capacity.max(1));
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let cancel = CancellationToken::new();

        let workers = (0..config.dispatch_workers.max(1))
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let dispatcher = Arc::clone(&dispatcher);
                let cancel = cancel.clone();
                tokio::spawn(dispatch_loop(worker_id, rx, dispatcher, cancel))
            })
            .collect();

        Self {
            tx,
            cancel,
            workers: Mutex::new(workers),
            stop_wait: config.stop_wait,
        }
    }

    pub fn sink(&self) -> ViolationSink {
        ViolationSink {
            tx: self.tx.clone(),
        }
    }

    /// Stop the workers and wait (bounded) for them to exit. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.drain(..).collect()
        };

        for mut handle in handles {
            match timeout(self.stop_wait, &mut handle).await {
                Ok(join_result) => {
                    join_result.context("dispatch worker task failed to join")?;
                }
                Err(_) => {
                    handle.abort();
                    warn!(
                        "dispatch worker did not exit within {:?}, aborted",
                        self.stop_wait
                    );
                }
            }
        }
        Ok(())
    }
}

async fn dispatch_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ViolationCandidate>>>,
    dispatcher: Arc<AlertDispatcher>,
    cancel: CancellationToken,
) {
    loop {
        let candidate = tokio::select! {
            received = async {
                let mut guard = rx.lock().await;
                guard.recv().await
            } => received,
            _ = cancel.cancelled() => {
                debug!("dispatch worker {worker_id} shutting down");
                break;
            }
        };

        match candidate {
            Some(candidate) => {
                dispatcher.create(&candidate);
            }
            None => {
                debug!("dispatch queue closed, worker {worker_id} exiting");
                break;
            }
        }
    }
}
