//! refuel - Three-stage fuel refill negotiation pipeline
//!
//! A car's sensor stage reports fuel state, a trader stage decides whether
//! to buy, and a station stage quotes a price payable in one settlement
//! token. Every stage is an opaque `text -> text` backend; the orchestrator
//! treats each output as untrusted and validates it before the next hop.
//!
//! # Architecture
//!
//! - Stage outputs are checked against a per-hop JSON schema
//! - Purchase requests must fall inside the policy band for their severity
//! - Quotes must match the request (total, token, car, fuel, liters)
//! - The first failure is terminal for the run; nothing is retried
//!
//! # Modules
//!
//! - `adapters`: Stage backends (simulated, command, webhook)
//! - `core`: Validation, policy, state machine and orchestration
//! - `domain`: Data structures (Event, Run, PipelineState)
//! - `config`: Configuration loading
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline with simulated stages
//! refuel run --fuel-level 8
//!
//! # Check a stage output by hand
//! refuel validate quote --input quote.json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{Stage, StageSet};
pub use core::{Orchestrator, PipelineConfig, PipelineError};
pub use domain::{Event, EventKind, PipelineState, Run, StageRecord, StageRole};
