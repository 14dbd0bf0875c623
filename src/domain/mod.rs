//! Domain types for the refuel pipeline.
//!
//! This module contains the core data structures:
//! - Events: Immutable, schema-tagged records exchanged between stages
//! - Run: Pipeline state machine states and the per-run transcript

pub mod events;
pub mod run;

// Re-export commonly used types
pub use events::{
    Event, EventKind, FuelLow, FuelOk, FuelQuote, FuelRequest, FuelType, Location, NoAction,
    PolicyTag, Priority, Severity, StageRole,
};
pub use run::{PipelineState, Run, StageRecord};
