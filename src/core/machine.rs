//! Typed transitions of the pipeline state machine.
//!
//! Each `accept_*` function takes the raw output of the stage the current
//! state is waiting for and returns the next state or the failure that
//! ends the run. They never call a stage, so tests can drive the machine
//! with synthetic outputs.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::domain::{Event, EventKind, FuelLow, FuelRequest, PipelineState, StageRole};

use super::consistency;
use super::error::PipelineError;
use super::orchestrator::PipelineConfig;
use super::policy;
use super::schema;

/// Seed input for the sensor stage
pub fn trigger_input(now: DateTime<Utc>) -> String {
    format!(
        "check sensors now; timestamp={}",
        now.to_rfc3339_opts(SecondsFormat::Micros, false)
    )
}

/// `AwaitSensor` -> `AwaitDecision`
pub fn accept_sensor(raw: &str, config: &PipelineConfig) -> Result<PipelineState, PipelineError> {
    let sensor = schema::validate(raw, EventKind::SENSOR)
        .map_err(|e| PipelineError::schema(StageRole::Sensor, e))?;

    if let Event::FuelLowDetected(low) = &sensor {
        consistency::check_sensor(low, config.strict_sensor_severity)
            .map_err(|e| PipelineError::consistency(StageRole::Sensor, e))?;
    }

    debug!(kind = %sensor.kind(), car_id = sensor.car_id(), "Sensor event accepted");
    Ok(PipelineState::AwaitDecision { sensor })
}

/// `AwaitDecision` -> `NoAction` | `AwaitQuote`
pub fn accept_decision(
    sensor: Event,
    raw: &str,
    config: &PipelineConfig,
) -> Result<PipelineState, PipelineError> {
    let decision = schema::validate(raw, EventKind::DECISION)
        .map_err(|e| PipelineError::schema(StageRole::Decision, e))?;

    match decision {
        Event::NoAction(decision) => {
            info!(car_id = %decision.car_id, reason = %decision.reason, "No action needed");
            Ok(PipelineState::NoAction { sensor, decision })
        }
        Event::FuelRequest(request) => {
            let band = policy::check_request(&request)?;
            let sensor = consistency::check_request(&sensor, &request, &config.settlement_token)
                .map_err(|e| PipelineError::consistency(StageRole::Decision, e))?;

            info!(
                severity = %band.severity,
                priority = %band.priority,
                liters = request.liters,
                "Fuel request accepted"
            );
            Ok(PipelineState::AwaitQuote { sensor, request })
        }
        // validate() only returns the kinds it was asked for
        other => Err(PipelineError::schema(
            StageRole::Decision,
            super::error::SchemaError::UnexpectedEventKind {
                expected: EventKind::DECISION.to_vec(),
                found: Some(other.kind().to_string()),
            },
        )),
    }
}

/// `AwaitQuote` -> `Complete`
pub fn accept_quote(
    sensor: FuelLow,
    request: FuelRequest,
    raw: &str,
    config: &PipelineConfig,
) -> Result<PipelineState, PipelineError> {
    let quote = match schema::validate(raw, EventKind::QUOTE)
        .map_err(|e| PipelineError::schema(StageRole::Counterparty, e))?
    {
        Event::FuelQuote(quote) => quote,
        other => {
            return Err(PipelineError::schema(
                StageRole::Counterparty,
                super::error::SchemaError::UnexpectedEventKind {
                    expected: EventKind::QUOTE.to_vec(),
                    found: Some(other.kind().to_string()),
                },
            ))
        }
    };

    consistency::check_quote(&request, &quote, &config.settlement_token)
        .map_err(|e| PipelineError::consistency(StageRole::Counterparty, e))?;

    info!(
        station_id = %quote.station_id,
        total_usd = quote.total_usd,
        token = %quote.payment_token,
        "Quote accepted"
    );
    Ok(PipelineState::Complete {
        sensor,
        request,
        quote,
    })
}

impl PipelineState {
    /// Text to hand the stage this state is waiting for
    pub fn stage_input(&self, now: DateTime<Utc>) -> Result<Option<String>, PipelineError> {
        let encode = |stage: StageRole, event: &Event| {
            event.to_json().map_err(|e| PipelineError::Encode {
                stage,
                message: e.to_string(),
            })
        };

        match self {
            Self::AwaitSensor => Ok(Some(trigger_input(now))),
            Self::AwaitDecision { sensor } => encode(StageRole::Decision, sensor).map(Some),
            Self::AwaitQuote { request, .. } => {
                encode(StageRole::Counterparty, &Event::FuelRequest(request.clone())).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Feed the pending stage's raw output into the machine
    pub fn advance(self, raw: &str, config: &PipelineConfig) -> PipelineState {
        let next = match self {
            Self::AwaitSensor => accept_sensor(raw, config),
            Self::AwaitDecision { sensor } => accept_decision(sensor, raw, config),
            Self::AwaitQuote { sensor, request } => accept_quote(sensor, request, raw, config),
            terminal => return terminal,
        };

        next.unwrap_or_else(|error| Self::Failed { error })
    }

    /// Move to `Failed`; terminal states are left as they are
    pub fn fail(self, error: PipelineError) -> PipelineState {
        if self.is_terminal() {
            self
        } else {
            Self::Failed { error }
        }
    }
}
