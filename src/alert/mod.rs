mod cooldown;
mod dispatcher;
mod store;

pub use cooldown::{Admission, CooldownGate};
pub use dispatcher::{AlertDispatcher, DispatchPipeline, ViolationSink};
pub use store::{AlertStore, AlertSummary, InMemoryAlertStore, NewAlert};
