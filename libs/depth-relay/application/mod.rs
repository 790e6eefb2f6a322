//! Application Layer
//!
//! Gate, fan-out and the orchestrator that wires them to a reader, plus
//! [`RelayApp`] which assembles the production pipeline from configuration.

pub mod app;
pub mod fanout;
pub mod gate;
pub mod orchestrator;

pub use app::RelayApp;
pub use fanout::{FanoutConfig, SubscriberRegistry};
pub use gate::DepthGate;
pub use orchestrator::{IngestState, Orchestrator, ShutdownReport, StopReason};
