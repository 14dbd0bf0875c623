//! Run state for a single pass through the pipeline.
//!
//! A Run owns the state machine position and a transcript of every stage
//! call made so far.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::error::PipelineError;

use super::events::{Event, FuelLow, FuelQuote, FuelRequest, NoAction, StageRole};

/// Position of a run in the pipeline state machine.
///
/// `AwaitSensor -> AwaitDecision -> (NoAction | AwaitQuote) -> Complete`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone)]
pub enum PipelineState {
    /// Waiting for the sensor stage
    AwaitSensor,

    /// Waiting for the decision stage to answer a sensor event
    AwaitDecision { sensor: Event },

    /// Waiting for the counterparty to quote a purchase request
    AwaitQuote {
        sensor: FuelLow,
        request: FuelRequest,
    },

    /// Decision stage declined; no counterparty call was made
    NoAction { sensor: Event, decision: NoAction },

    /// Quote accepted after all consistency checks
    Complete {
        sensor: FuelLow,
        request: FuelRequest,
        quote: FuelQuote,
    },

    /// Absorbing failure state
    Failed { error: PipelineError },
}

impl PipelineState {
    /// State machine name of this state
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitSensor => "AWAIT_SENSOR",
            Self::AwaitDecision { .. } => "AWAIT_DECISION",
            Self::AwaitQuote { .. } => "AWAIT_QUOTE",
            Self::NoAction { .. } => "TERMINAL_NO_ACTION",
            Self::Complete { .. } => "TERMINAL_COMPLETE",
            Self::Failed { .. } => "TERMINAL_FAILED",
        }
    }

    /// The stage whose output this state is waiting for
    pub fn pending_stage(&self) -> Option<StageRole> {
        match self {
            Self::AwaitSensor => Some(StageRole::Sensor),
            Self::AwaitDecision { .. } => Some(StageRole::Decision),
            Self::AwaitQuote { .. } => Some(StageRole::Counterparty),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.pending_stage().is_none()
    }

    /// Terminal success (no action or complete)
    pub fn is_success(&self) -> bool {
        matches!(self, Self::NoAction { .. } | Self::Complete { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One stage call in a run's transcript
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub role: StageRole,

    /// Text handed to the stage
    pub input: String,

    /// Raw text returned by the stage (None if the call itself failed)
    pub output: Option<String>,

    pub duration_ms: u64,
}

/// A single pipeline execution
#[derive(Debug, Clone)]
pub struct Run {
    /// Unique identifier for this run
    pub id: Uuid,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Current state machine position
    pub state: PipelineState,

    /// Stage calls in execution order
    pub transcript: Vec<StageRecord>,
}

impl Run {
    /// Create a run positioned at `AwaitSensor`
    pub fn new(id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            completed_at: None,
            state: PipelineState::AwaitSensor,
            transcript: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Process exit status for this run: 0 on success, 1 on failure
    pub fn exit_code(&self) -> i32 {
        if self.state.is_success() {
            0
        } else {
            1
        }
    }

    /// The failure, if the run failed
    pub fn error(&self) -> Option<&PipelineError> {
        match &self.state {
            PipelineState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// The accepted quote, if the run completed
    pub fn quote(&self) -> Option<&FuelQuote> {
        match &self.state {
            PipelineState::Complete { quote, .. } => Some(quote),
            _ => None,
        }
    }

    /// Whether a stage was called during this run
    pub fn called(&self, role: StageRole) -> bool {
        self.transcript.iter().any(|r| r.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::InvokeError;

    #[test]
    fn test_run_creation() {
        let run_id = Uuid::new_v4();
        let run = Run::new(run_id, Utc::now());

        assert_eq!(run.id, run_id);
        assert_eq!(run.state.name(), "AWAIT_SENSOR");
        assert_eq!(run.state.pending_stage(), Some(StageRole::Sensor));
        assert!(!run.is_finished());
    }

    #[test]
    fn test_failed_run_exit_code() {
        let mut run = Run::new(Uuid::new_v4(), Utc::now());
        run.state = PipelineState::Failed {
            error: InvokeError::Cancelled {
                stage: StageRole::Sensor,
            }
            .into(),
        };

        assert!(run.is_finished());
        assert_eq!(run.exit_code(), 1);
        assert!(run.error().is_some());
        assert!(run.quote().is_none());
    }
}
