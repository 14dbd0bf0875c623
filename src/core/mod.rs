//! Core orchestration logic.
//!
//! This module contains:
//! - Schema: Event schema validation
//! - Invoker: Stage calls with timeout and cancellation
//! - Policy: Severity to policy band mapping
//! - Consistency: Cross-field checks between hand-offs
//! - Machine: Typed state machine transitions
//! - Orchestrator: Main execution engine

pub mod consistency;
pub mod error;
pub mod invoker;
pub mod machine;
pub mod orchestrator;
pub mod policy;
pub mod schema;

// Re-export commonly used types
pub use error::{ConsistencyViolation, InvokeError, PipelineError, PolicyError, SchemaError};
pub use invoker::StageInvoker;
pub use machine::{accept_decision, accept_quote, accept_sensor, trigger_input};
pub use orchestrator::{HopObserver, Orchestrator, PipelineConfig, DEFAULT_SETTLEMENT_TOKEN};
pub use policy::{band_for, PolicyBand, BANDS};
pub use schema::validate;
