//! Error taxonomy for pipeline runs.
//!
//! Every variant is terminal for the run that produced it. Nothing here is
//! retried.

use thiserror::Error;

use crate::domain::{EventKind, Severity, StageRole};

/// Stage output does not match the expected event schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("output is not valid JSON: {message}\nOutput was:\n{raw}")]
    MalformedJson { raw: String, message: String },

    #[error(
        "unexpected event kind {}, expected one of [{}]",
        .found.as_deref().unwrap_or("<missing>"),
        join_kinds(.expected)
    )]
    UnexpectedEventKind {
        expected: Vec<EventKind>,
        found: Option<String>,
    },

    #[error("field '{field}' is missing or not {expected}")]
    MissingOrWrongTypeField { field: String, expected: String },

    #[error("event could not be decoded: {0}")]
    Decode(String),
}

fn join_kinds(kinds: &[EventKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Purchase request that breaks the severity -> band mapping
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),

    #[error("{severity} policy band violated: {field} = {value}, expected {expected}")]
    PolicyBandViolation {
        severity: Severity,
        field: &'static str,
        value: String,
        expected: String,
    },
}

/// Cross-field check failure between hand-offs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsistencyViolation {
    #[error("math check failed: total_usd={total} expected={expected}")]
    TotalMismatch { total: f64, expected: f64 },

    #[error("payment token mismatch: expected {expected}, got {found}")]
    TokenMismatch { expected: String, found: String },

    #[error("missing {0} in quote")]
    MissingPaymentField(&'static str),

    #[error("{field} does not trace back upstream: expected {expected}, got {found}")]
    TraceMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("FUEL_REQUEST issued in answer to a FUEL_OK sensor event")]
    UnprovokedRequest,

    #[error("sensor severity {declared} disagrees with fuel level {fuel_level_percent}% (expected {expected})")]
    SeverityMismatch {
        declared: Severity,
        expected: Severity,
        fuel_level_percent: f64,
    },
}

/// Stage collaborator did not produce output
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    #[error("{stage} stage invocation failed: {message}")]
    StageInvocation { stage: StageRole, message: String },

    #[error("{stage} stage was cancelled")]
    Cancelled { stage: StageRole },
}

/// Terminal failure of a pipeline run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("{stage} stage output rejected: {source}")]
    Schema { stage: StageRole, source: SchemaError },

    #[error("decision stage violated policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("consistency check failed at {stage} stage: {source}")]
    ConsistencyCheckFailed {
        stage: StageRole,
        source: ConsistencyViolation,
    },

    #[error("could not encode input for {stage} stage: {message}")]
    Encode { stage: StageRole, message: String },
}

impl PipelineError {
    pub fn schema(stage: StageRole, source: SchemaError) -> Self {
        Self::Schema { stage, source }
    }

    pub fn consistency(stage: StageRole, source: ConsistencyViolation) -> Self {
        Self::ConsistencyCheckFailed { stage, source }
    }

    /// Taxonomy name used in operator diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Invoke(InvokeError::StageInvocation { .. }) => "StageInvocationError",
            Self::Invoke(InvokeError::Cancelled { .. }) => "Cancelled",
            Self::Schema { source, .. } => match source {
                SchemaError::MalformedJson { .. } => "MalformedJson",
                SchemaError::UnexpectedEventKind { .. } => "UnexpectedEventKind",
                SchemaError::MissingOrWrongTypeField { .. } | SchemaError::Decode(_) => {
                    "MissingOrWrongTypeField"
                }
            },
            Self::Policy(PolicyError::UnknownSeverity(_)) => "UnknownSeverity",
            Self::Policy(PolicyError::PolicyBandViolation { .. }) => "PolicyBandViolation",
            Self::ConsistencyCheckFailed { .. } => "ConsistencyCheckFailed",
            Self::Encode { .. } => "EncodeError",
        }
    }

    /// Stage the failure is attributed to, where one is known
    pub fn stage(&self) -> Option<StageRole> {
        match self {
            Self::Invoke(InvokeError::StageInvocation { stage, .. })
            | Self::Invoke(InvokeError::Cancelled { stage })
            | Self::Schema { stage, .. }
            | Self::ConsistencyCheckFailed { stage, .. }
            | Self::Encode { stage, .. } => Some(*stage),
            Self::Policy(_) => Some(StageRole::Decision),
        }
    }

    /// Raw offending text for malformed output
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::Schema {
                source: SchemaError::MalformedJson { raw, .. },
                ..
            } => Some(raw),
            _ => None,
        }
    }
}
