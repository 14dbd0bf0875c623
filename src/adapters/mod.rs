//! Stage backends.
//!
//! Each pipeline stage is an opaque `text -> text` capability. The core
//! only hands it an input string and validates whatever comes back.

pub mod command;
pub mod prompts;
pub mod simulated;
pub mod webhook;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{ResolvedConfig, StageBackend};
use crate::domain::StageRole;

pub use command::CommandStage;
pub use simulated::{PolicyTrader, SimulatedSensor, SimulatedStation};
pub use webhook::WebhookStage;

/// Trait for stage implementations
#[async_trait]
pub trait Stage: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Produce raw output text for the given input
    async fn generate(&self, input: &str) -> Result<String>;
}

/// One backend per pipeline stage
pub struct StageSet {
    pub sensor: Box<dyn Stage>,
    pub decision: Box<dyn Stage>,
    pub counterparty: Box<dyn Stage>,
}

impl StageSet {
    pub fn new(
        sensor: Box<dyn Stage>,
        decision: Box<dyn Stage>,
        counterparty: Box<dyn Stage>,
    ) -> Self {
        Self {
            sensor,
            decision,
            counterparty,
        }
    }

    /// Build the backends selected in configuration
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        Ok(Self {
            sensor: build_stage(StageRole::Sensor, config)?,
            decision: build_stage(StageRole::Decision, config)?,
            counterparty: build_stage(StageRole::Counterparty, config)?,
        })
    }

    /// Backend for a role
    pub fn get(&self, role: StageRole) -> &dyn Stage {
        match role {
            StageRole::Sensor => self.sensor.as_ref(),
            StageRole::Decision => self.decision.as_ref(),
            StageRole::Counterparty => self.counterparty.as_ref(),
        }
    }
}

fn build_stage(role: StageRole, config: &ResolvedConfig) -> Result<Box<dyn Stage>> {
    let instructions = prompts::instructions(role, &config.settlement_token);

    let stage: Box<dyn Stage> = match config.stages.for_role(role) {
        StageBackend::Simulated => match role {
            StageRole::Sensor => Box::new(SimulatedSensor::new(config.simulation.clone())),
            StageRole::Decision => Box::new(PolicyTrader::new(
                config.settlement_token.clone(),
                config.simulation.fuel_type,
            )),
            StageRole::Counterparty => Box::new(SimulatedStation::new(
                config.simulation.station_id.clone(),
                config.settlement_token.clone(),
            )),
        },
        StageBackend::Command {
            program,
            args,
            send_instructions,
        } => {
            let mut stage = CommandStage::new(program.clone(), args.clone());
            if *send_instructions {
                stage = stage.with_instructions(instructions);
            }
            Box::new(stage)
        }
        StageBackend::Webhook {
            endpoint,
            token_env,
        } => {
            let token = match token_env {
                Some(var) => Some(std::env::var(var).with_context(|| {
                    format!("{} environment variable required for {} stage", var, role)
                })?),
                None => None,
            };
            Box::new(WebhookStage::new(role, endpoint.clone(), token, instructions))
        }
    };

    Ok(stage)
}
