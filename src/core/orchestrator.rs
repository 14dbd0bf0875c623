//! Main orchestrator for pipeline execution.
//!
//! Drives the state machine one hop at a time: ask the pending stage for
//! output, feed it to the machine, stop at the first terminal state.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::StageSet;
use crate::domain::{PipelineState, Run, StageRecord};

use super::invoker::StageInvoker;

/// Settlement token used when nothing else is configured
pub const DEFAULT_SETTLEMENT_TOKEN: &str = "USDC";

/// Per-stage timeout used when nothing else is configured
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Run-wide settings injected into the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// The one payment token every event in a run must name
    pub settlement_token: String,

    /// Limit on a single stage call (None = wait indefinitely)
    pub stage_timeout: Option<Duration>,

    /// Fail when sensor severity disagrees with the fuel level
    pub strict_sensor_severity: bool,
}

impl PipelineConfig {
    pub fn new(settlement_token: impl Into<String>) -> Self {
        Self {
            settlement_token: settlement_token.into(),
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            strict_sensor_severity: false,
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_strict_sensor_severity(mut self, strict: bool) -> Self {
        self.strict_sensor_severity = strict;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLEMENT_TOKEN)
    }
}

/// Called with each stage record as soon as the hop lands
pub type HopObserver = Box<dyn Fn(&StageRecord) + Send + Sync>;

/// Main pipeline orchestrator
pub struct Orchestrator {
    stages: StageSet,
    config: PipelineConfig,
    invoker: StageInvoker,
    observer: Option<HopObserver>,
}

impl Orchestrator {
    /// Create an orchestrator over the given stage backends
    pub fn new(stages: StageSet, config: PipelineConfig) -> Self {
        let invoker = StageInvoker::new(config.stage_timeout);
        Self {
            stages,
            config,
            invoker,
            observer: None,
        }
    }

    /// Report every hop while the run is still in progress
    pub fn with_observer(mut self, observer: impl Fn(&StageRecord) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Cancel in-flight stage calls when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.invoker = self.invoker.with_cancellation(cancel);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run, seeding the sensor stage with the current time
    pub async fn run(&self) -> Run {
        self.run_at(Utc::now()).await
    }

    /// Execute one run with an explicit trigger timestamp
    #[instrument(skip(self))]
    pub async fn run_at(&self, now: DateTime<Utc>) -> Run {
        let mut run = Run::new(Uuid::new_v4(), now);
        info!(
            run_id = %run.id,
            token = %self.config.settlement_token,
            "Starting pipeline run"
        );

        while let Some(role) = run.state.pending_stage() {
            let state = std::mem::replace(&mut run.state, PipelineState::AwaitSensor);

            let input = match state.stage_input(now) {
                Ok(Some(input)) => input,
                Ok(None) => {
                    run.state = state;
                    break;
                }
                Err(e) => {
                    run.state = state.fail(e);
                    break;
                }
            };

            let stage_start = Instant::now();
            let result = self.invoker.invoke(role, self.stages.get(role), &input).await;
            let duration_ms = stage_start.elapsed().as_millis() as u64;

            let (record, next) = match result {
                Ok(raw) => {
                    let next = state.advance(&raw, &self.config);
                    info!(
                        stage = %role,
                        duration_ms,
                        next = next.name(),
                        "Stage output received"
                    );
                    let record = StageRecord {
                        role,
                        input,
                        output: Some(raw),
                        duration_ms,
                    };
                    (record, next)
                }
                Err(e) => {
                    warn!(stage = %role, duration_ms, error = %e, "Stage call failed");
                    let record = StageRecord {
                        role,
                        input,
                        output: None,
                        duration_ms,
                    };
                    (record, state.fail(e.into()))
                }
            };

            if let Some(observer) = &self.observer {
                observer(&record);
            }
            run.transcript.push(record);
            run.state = next;
        }

        run.completed_at = Some(Utc::now());

        match run.error() {
            Some(e) => error!(
                run_id = %run.id,
                category = e.category(),
                error = %e,
                "Run failed"
            ),
            None => info!(run_id = %run.id, state = run.state.name(), "Run finished"),
        }

        run
    }
}
