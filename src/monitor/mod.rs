mod audio;
mod registry;
mod screen;

pub use audio::{AudioSessionMonitor, AudioStatus};
pub use registry::MonitorRegistry;
pub use screen::{ScreenSessionMonitor, ScreenStatus};

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::alert::ViolationSink;
use crate::config::MonitorConfig;
use crate::types::SessionId;

/// Lifecycle contract shared by the audio and screen monitor flavors.
/// The registry is generic over this, so both get identical start/stop
/// and snapshot handling.
pub trait Monitor: Send + Sync + Sized + 'static {
    type Status: Clone + Serialize + Send + 'static;

    fn new(session_id: SessionId, config: Arc<MonitorConfig>, sink: ViolationSink) -> Self;

    /// Begin monitoring. Idempotent while running; not productive again
    /// after `stop` (construct a new instance for a new attempt).
    fn start(&self);

    /// Signal any background task to exit and wait (bounded) for it.
    /// Idempotent, and safe to call on a monitor that never started.
    /// No callback fires for this session after it returns.
    fn stop(&self) -> impl Future<Output = Result<()>> + Send;

    fn status(&self) -> Self::Status;

    fn session_id(&self) -> SessionId;
}
