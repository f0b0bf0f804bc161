//! Live monitoring and alerting core for exam proctoring.
//!
//! For every active exam session, independent monitors analyze audio and
//! window-focus signals (plus externally classified video-frame results),
//! smooth them over rolling windows, and funnel violation candidates
//! through a cooldown gate into a bounded dispatch pipeline that persists
//! deduplicated alerts. Sessions are fully independent; stopping one
//! releases its background task and buffers without affecting the rest.
//!
//! The HTTP layer, the video-frame detectors and the durable alert
//! storage are external collaborators; see [`alert::AlertStore`] for the
//! persistence boundary and [`service::ProctorService`] for the wiring.

pub mod alert;
pub mod classify;
pub mod config;
pub mod error;
pub mod monitor;
pub mod service;
pub mod types;
pub mod window;

pub use alert::{AlertDispatcher, AlertStore, CooldownGate, DispatchPipeline, InMemoryAlertStore};
pub use config::MonitorConfig;
pub use error::StoreError;
pub use monitor::{AudioSessionMonitor, Monitor, MonitorRegistry, ScreenSessionMonitor};
pub use service::ProctorService;
pub use types::{
    Alert, FrameSignals, SessionId, Severity, ViolationCandidate, ViolationKind,
};
pub use window::RollingWindow;
