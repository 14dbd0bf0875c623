//! Event records exchanged between pipeline stages.
//!
//! Every record is created by exactly one stage, handed forward by value,
//! and never mutated afterwards. The `event` field is the discriminator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A schema-validated event produced by one of the three stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Sensor reading with nothing to report
    #[serde(rename = "FUEL_OK")]
    FuelOk(FuelOk),

    /// Sensor reading below the alert threshold
    #[serde(rename = "FUEL_LOW_DETECTED")]
    FuelLowDetected(FuelLow),

    /// Decision stage declined to buy fuel
    #[serde(rename = "NO_ACTION")]
    NoAction(NoAction),

    /// Decision stage purchase request
    #[serde(rename = "FUEL_REQUEST")]
    FuelRequest(FuelRequest),

    /// Counterparty price quote with payment instructions
    #[serde(rename = "FUEL_QUOTE")]
    FuelQuote(FuelQuote),
}

impl Event {
    /// The discriminator of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FuelOk(_) => EventKind::FuelOk,
            Self::FuelLowDetected(_) => EventKind::FuelLowDetected,
            Self::NoAction(_) => EventKind::NoAction,
            Self::FuelRequest(_) => EventKind::FuelRequest,
            Self::FuelQuote(_) => EventKind::FuelQuote,
        }
    }

    /// Car the event refers to
    pub fn car_id(&self) -> &str {
        match self {
            Self::FuelOk(e) => &e.car_id,
            Self::FuelLowDetected(e) => &e.car_id,
            Self::NoAction(e) => &e.car_id,
            Self::FuelRequest(e) => &e.car_id,
            Self::FuelQuote(e) => &e.car_id,
        }
    }

    /// Serialize to the JSON text handed to the next stage
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Event discriminator values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    FuelOk,
    FuelLowDetected,
    NoAction,
    FuelRequest,
    FuelQuote,
}

impl EventKind {
    /// Kinds the sensor stage may emit
    pub const SENSOR: &'static [EventKind] = &[EventKind::FuelOk, EventKind::FuelLowDetected];

    /// Kinds the decision stage may emit
    pub const DECISION: &'static [EventKind] = &[EventKind::NoAction, EventKind::FuelRequest];

    /// Kinds the counterparty stage may emit
    pub const QUOTE: &'static [EventKind] = &[EventKind::FuelQuote];

    pub const ALL: &'static [EventKind] = &[
        EventKind::FuelOk,
        EventKind::FuelLowDetected,
        EventKind::NoAction,
        EventKind::FuelRequest,
        EventKind::FuelQuote,
    ];

    /// Wire value of the discriminator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FuelOk => "FUEL_OK",
            Self::FuelLowDetected => "FUEL_LOW_DETECTED",
            Self::NoAction => "NO_ACTION",
            Self::FuelRequest => "FUEL_REQUEST",
            Self::FuelQuote => "FUEL_QUOTE",
        }
    }

    /// Look up a kind by its wire value
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == value)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS position of the car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Sensor event when the tank is fine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelOk {
    pub car_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_level_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_km_estimate: Option<f64>,
}

/// Sensor event when the tank needs a refill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelLow {
    pub car_id: String,

    /// ISO-8601 reading time
    pub timestamp: String,

    pub location: Location,

    pub odometer_km: f64,

    pub fuel_level_percent: f64,

    pub range_km_estimate: f64,

    /// Must agree with `fuel_level_percent` (see `Severity::for_fuel_level`)
    pub severity: Severity,
}

/// Decision event declining to buy fuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoAction {
    pub car_id: String,
    pub reason: String,
}

/// Decision event asking a station for fuel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelRequest {
    pub car_id: String,

    /// Copied from the triggering sensor event
    pub timestamp: String,

    /// Copied from the triggering sensor event
    pub location: Location,

    pub fuel_type: FuelType,

    pub liters: f64,

    pub max_price_per_liter_usd: f64,

    pub payment_token: String,

    pub delivery_deadline_minutes: f64,

    pub policy: PolicyTag,

    pub reason: String,
}

/// Policy labels declared by the decision stage.
///
/// Kept as raw labels: an unknown severity is a policy failure, not a
/// schema failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTag {
    pub severity: String,
    pub priority: String,
}

/// Counterparty quote with payment instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelQuote {
    pub station_id: String,
    pub timestamp: String,
    pub car_id: String,
    pub fuel_type: String,
    pub liters: f64,
    pub price_per_liter_usd: f64,
    pub total_usd: f64,
    pub payment_token: String,
    pub payment_address: String,
    pub payment_memo: String,
    pub expires_in_seconds: f64,
    pub next_step: String,
}

/// Urgency of a refill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    /// Severity implied by a fuel level: >25 LOW, 10..=25 MEDIUM, <10 HIGH
    pub fn for_fuel_level(fuel_level_percent: f64) -> Self {
        if fuel_level_percent < 10.0 {
            Self::High
        } else if fuel_level_percent <= 25.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse a wire label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commercial priority attached to a severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Cheapest,
    Balanced,
    Fastest,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cheapest => "CHEAPEST",
            Self::Balanced => "BALANCED",
            Self::Fastest => "FASTEST",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FuelType {
    #[default]
    Gasoline,
    Ethanol,
    Diesel,
}

impl FuelType {
    pub const LABELS: &'static [&'static str] = &["GASOLINE", "ETHANOL", "DIESEL"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gasoline => "GASOLINE",
            Self::Ethanol => "ETHANOL",
            Self::Diesel => "DIESEL",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three stages of the pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Emits the fuel-state event
    Sensor,

    /// Applies policy and produces a purchase request
    Decision,

    /// Returns a priced quote
    Counterparty,
}

impl StageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Decision => "decision",
            Self::Counterparty => "counterparty",
        }
    }

    /// Heading printed above the stage's raw output
    pub fn hop_label(&self) -> &'static str {
        match self {
            Self::Sensor => "Sensors -> Trader (event)",
            Self::Decision => "Trader -> Station (request or no action)",
            Self::Counterparty => "Station -> Trader/Car (quote)",
        }
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
