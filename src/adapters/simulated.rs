//! Deterministic rule-engine stages.
//!
//! These stand in for generative backends so the pipeline can run without
//! any external service. Each one honours the same JSON contract a remote
//! generator must.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::config::SimulationConfig;
use crate::core::policy::band_for;
use crate::core::schema;
use crate::domain::{
    Event, EventKind, FuelLow, FuelOk, FuelQuote, FuelRequest, FuelType, Location, NoAction,
    PolicyTag, Severity,
};

use super::Stage;

/// Quote validity window
const QUOTE_TTL_SECONDS: f64 = 900.0;

/// Station discount below the car's maximum price
const STATION_DISCOUNT_USD: f64 = 0.05;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Sensor reading built from configured car state
pub struct SimulatedSensor {
    config: SimulationConfig,
}

impl SimulatedSensor {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Take the timestamp from a `...; timestamp=<iso>` trigger
    fn trigger_timestamp(input: &str) -> Option<String> {
        input
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("timestamp="))
            .map(|ts| ts.trim().to_string())
            .find(|ts| !ts.is_empty())
    }

    fn reading(&self, timestamp: String) -> Event {
        let cfg = &self.config;
        let range_km_estimate =
            (cfg.fuel_level_percent / 100.0 * cfg.tank_capacity_liters * cfg.km_per_liter).round();

        if cfg.fuel_level_percent > cfg.alert_threshold_percent {
            return Event::FuelOk(FuelOk {
                car_id: cfg.car_id.clone(),
                timestamp: Some(timestamp),
                fuel_level_percent: Some(cfg.fuel_level_percent),
                range_km_estimate: Some(range_km_estimate),
            });
        }

        Event::FuelLowDetected(FuelLow {
            car_id: cfg.car_id.clone(),
            timestamp,
            location: Location {
                lat: cfg.lat,
                lon: cfg.lon,
            },
            odometer_km: cfg.odometer_km,
            fuel_level_percent: cfg.fuel_level_percent,
            range_km_estimate,
            severity: Severity::for_fuel_level(cfg.fuel_level_percent),
        })
    }
}

#[async_trait]
impl Stage for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated-sensor"
    }

    async fn generate(&self, input: &str) -> Result<String> {
        let timestamp = Self::trigger_timestamp(input).unwrap_or_else(now_iso);
        self.reading(timestamp)
            .to_json()
            .context("Failed to encode sensor reading")
    }
}

/// Decision stage that applies the policy table directly
pub struct PolicyTrader {
    settlement_token: String,
    fuel_type: FuelType,
}

impl PolicyTrader {
    pub fn new(settlement_token: impl Into<String>, fuel_type: FuelType) -> Self {
        Self {
            settlement_token: settlement_token.into(),
            fuel_type,
        }
    }

    /// Request at the centre of the severity's band
    fn request_for(&self, low: FuelLow) -> FuelRequest {
        let band = band_for(low.severity);

        FuelRequest {
            car_id: low.car_id,
            timestamp: low.timestamp,
            location: low.location,
            fuel_type: self.fuel_type,
            liters: band.liters.midpoint().round(),
            max_price_per_liter_usd: round_cents(band.max_price_per_liter_usd.midpoint()),
            payment_token: self.settlement_token.clone(),
            delivery_deadline_minutes: band.delivery_deadline_minutes.midpoint().round(),
            policy: PolicyTag {
                severity: band.severity.to_string(),
                priority: band.priority.to_string(),
            },
            reason: format!(
                "Fuel at {}% is {} severity; requesting delivery with {} priority",
                low.fuel_level_percent, band.severity, band.priority
            ),
        }
    }
}

#[async_trait]
impl Stage for PolicyTrader {
    fn name(&self) -> &str {
        "policy-trader"
    }

    async fn generate(&self, input: &str) -> Result<String> {
        let sensor =
            schema::validate(input, EventKind::SENSOR).context("Trader could not read sensor event")?;

        let decision = match sensor {
            Event::FuelLowDetected(low) => Event::FuelRequest(self.request_for(low)),
            other => Event::NoAction(NoAction {
                car_id: other.car_id().to_string(),
                reason: "Fuel level OK".to_string(),
            }),
        };

        decision.to_json().context("Failed to encode decision")
    }
}

/// Counterparty that quotes just under the car's maximum price
pub struct SimulatedStation {
    station_id: String,
    settlement_token: String,
}

impl SimulatedStation {
    pub fn new(station_id: impl Into<String>, settlement_token: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            settlement_token: settlement_token.into(),
        }
    }

    fn quote_for(&self, request: FuelRequest) -> FuelQuote {
        let price_per_liter_usd =
            round_cents(request.max_price_per_liter_usd - STATION_DISCOUNT_USD).max(0.01);
        let total_usd = request.liters * price_per_liter_usd;

        let address_seed = Uuid::new_v4().simple().to_string();
        let address_tail = Uuid::new_v4().simple().to_string();
        let payment_address = format!("0x{}{}", address_seed, &address_tail[..8]);
        let invoice = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
        let payment_memo = format!("{}:INV-{}", request.car_id, invoice);

        FuelQuote {
            station_id: self.station_id.clone(),
            timestamp: now_iso(),
            car_id: request.car_id,
            fuel_type: request.fuel_type.to_string(),
            liters: request.liters,
            price_per_liter_usd,
            total_usd,
            payment_token: self.settlement_token.clone(),
            next_step: format!(
                "Send exactly {:.2} {} to {} with memo {}",
                total_usd, self.settlement_token, payment_address, payment_memo
            ),
            payment_address,
            payment_memo,
            expires_in_seconds: QUOTE_TTL_SECONDS,
        }
    }
}

#[async_trait]
impl Stage for SimulatedStation {
    fn name(&self) -> &str {
        "simulated-station"
    }

    async fn generate(&self, input: &str) -> Result<String> {
        let request = match schema::validate(input, &[EventKind::FuelRequest])
            .context("Station could not read fuel request")?
        {
            Event::FuelRequest(request) => request,
            other => anyhow::bail!("Station expected FUEL_REQUEST, got {}", other.kind()),
        };

        Event::FuelQuote(self.quote_for(request))
            .to_json()
            .context("Failed to encode quote")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::check_request;

    fn sensor_with_level(level: f64) -> SimulatedSensor {
        SimulatedSensor::new(SimulationConfig {
            fuel_level_percent: level,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_sensor_uses_trigger_timestamp() {
        let out = sensor_with_level(5.0)
            .generate("check sensors now; timestamp=2026-03-01T12:00:00+00:00")
            .await
            .unwrap();

        match schema::validate(&out, EventKind::SENSOR).unwrap() {
            Event::FuelLowDetected(low) => {
                assert_eq!(low.timestamp, "2026-03-01T12:00:00+00:00");
                assert_eq!(low.severity, Severity::High);
                assert_eq!(low.range_km_estimate, 30.0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sensor_reports_ok_above_threshold() {
        let out = sensor_with_level(72.0).generate("check sensors now").await.unwrap();
        assert_eq!(
            schema::validate(&out, EventKind::SENSOR).unwrap().kind(),
            EventKind::FuelOk
        );
    }

    #[tokio::test]
    async fn test_trader_requests_stay_in_band() {
        let trader = PolicyTrader::new("USDC", FuelType::Ethanol);

        for level in [5.0, 18.0, 40.0] {
            let sensor = sensor_with_level(level)
                .generate("timestamp=2026-03-01T12:00:00Z")
                .await
                .unwrap();
            let out = trader.generate(&sensor).await.unwrap();

            match schema::validate(&out, EventKind::DECISION).unwrap() {
                Event::FuelRequest(request) => {
                    let band = check_request(&request).unwrap();
                    assert_eq!(band.severity, Severity::for_fuel_level(level));
                    assert_eq!(request.fuel_type, FuelType::Ethanol);
                    assert_eq!(request.timestamp, "2026-03-01T12:00:00Z");
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_trader_declines_when_fuel_ok() {
        let trader = PolicyTrader::new("USDC", FuelType::Gasoline);
        let out = trader
            .generate(r#"{"event":"FUEL_OK","car_id":"car-009"}"#)
            .await
            .unwrap();

        assert_eq!(
            schema::validate(&out, EventKind::DECISION).unwrap(),
            Event::NoAction(NoAction {
                car_id: "car-009".to_string(),
                reason: "Fuel level OK".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_trader_rejects_prose() {
        let trader = PolicyTrader::new("USDC", FuelType::Gasoline);
        assert!(trader.generate("tank is nearly empty").await.is_err());
    }

    #[tokio::test]
    async fn test_station_quote_is_consistent() {
        let trader = PolicyTrader::new("USDC", FuelType::Gasoline);
        let station = SimulatedStation::new("station-777", "USDC");

        let sensor = sensor_with_level(5.0).generate("timestamp=2026-03-01T12:00:00Z").await.unwrap();
        let request = trader.generate(&sensor).await.unwrap();
        let out = station.generate(&request).await.unwrap();

        match schema::validate(&out, EventKind::QUOTE).unwrap() {
            Event::FuelQuote(quote) => {
                assert_eq!(quote.liters, 40.0);
                assert_eq!(quote.price_per_liter_usd, 2.45);
                assert!((quote.total_usd - quote.liters * quote.price_per_liter_usd).abs() <= 1e-6);
                assert!(quote.payment_address.starts_with("0x"));
                assert_eq!(quote.payment_address.len(), 42);
                assert!(quote.payment_memo.starts_with("car-001:INV-"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
