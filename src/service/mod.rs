pub mod emitter;
pub mod tracker_service;

pub use emitter::{EmitOutcome, EventEmitter};
pub use tracker_service::{ProductionTrackerService, SessionTrackerService};
