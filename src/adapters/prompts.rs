//! Instruction text handed to generative stage backends.
//!
//! Simulated stages ignore these; command and webhook backends can send
//! them along with the stage input.

use crate::core::policy::{BANDS, HIGH, LOW, MEDIUM};
use crate::domain::StageRole;

/// Instructions for a stage, with the settlement token filled in
pub fn instructions(role: StageRole, settlement_token: &str) -> String {
    match role {
        StageRole::Sensor => sensor(),
        StageRole::Decision => decision(settlement_token),
        StageRole::Counterparty => counterparty(settlement_token),
    }
}

fn sensor() -> String {
    r#"You simulate the fuel sensors of an autonomous car. Reply with one JSON object and nothing else (no markdown).

When the tank is fine:
{"event": "FUEL_OK", "car_id": "car-001", "timestamp": "ISO-8601 string", "fuel_level_percent": number}

When fuel is low:
{
  "event": "FUEL_LOW_DETECTED",
  "car_id": "car-001",
  "timestamp": "ISO-8601 string",
  "location": {"lat": number, "lon": number},
  "odometer_km": number,
  "fuel_level_percent": number,
  "range_km_estimate": number,
  "severity": "LOW" | "MEDIUM" | "HIGH"
}

Rules:
- severity follows fuel_level_percent: LOW above 25, MEDIUM from 10 to 25, HIGH below 10.
- Use the timestamp given in the input.
- Coordinates should be a plausible street location (e.g. Sao Paulo).
- Keep values realistic."#
        .to_string()
}

fn decision(token: &str) -> String {
    let rules: Vec<String> = BANDS
        .iter()
        .map(|band| {
            format!(
                "- severity {}: liters {}, max_price_per_liter_usd {}, delivery_deadline_minutes {}, priority {}",
                band.severity,
                band.liters,
                band.max_price_per_liter_usd,
                band.delivery_deadline_minutes,
                band.priority
            )
        })
        .collect();

    format!(
        r#"You are the car's fuel trading agent. The input is a sensor event as JSON. Reply with one JSON object and nothing else (no markdown).

For FUEL_OK reply:
{{"event": "NO_ACTION", "car_id": "<car_id>", "reason": "Fuel level OK"}}

For FUEL_LOW_DETECTED reply with a purchase request:
{{
  "event": "FUEL_REQUEST",
  "car_id": "string",
  "timestamp": "<sensor timestamp>",
  "location": <sensor location>,
  "fuel_type": "GASOLINE" | "ETHANOL" | "DIESEL",
  "liters": number,
  "max_price_per_liter_usd": number,
  "payment_token": "{token}",
  "delivery_deadline_minutes": number,
  "policy": {{"severity": "{low}" | "{medium}" | "{high}", "priority": "{cheap}" | "{balanced}" | "{fast}"}},
  "reason": "string"
}}

Policy (mandatory):
- Pay in {token} only.
{rules}
- Copy timestamp and location from the sensor event unchanged.
- reason must name the severity and the chosen priority."#,
        token = token,
        low = LOW.severity,
        medium = MEDIUM.severity,
        high = HIGH.severity,
        cheap = LOW.priority,
        balanced = MEDIUM.priority,
        fast = HIGH.priority,
        rules = rules.join("\n"),
    )
}

fn counterparty(token: &str) -> String {
    format!(
        r#"You are a gas station agent. The input is a FUEL_REQUEST as JSON. Reply with one JSON quote object and nothing else (no markdown).

{{
  "event": "FUEL_QUOTE",
  "station_id": "station-777",
  "timestamp": "ISO-8601 string",
  "car_id": "string",
  "fuel_type": "string",
  "liters": number,
  "price_per_liter_usd": number,
  "total_usd": number,
  "payment_token": "{token}",
  "payment_address": "string",
  "payment_memo": "string",
  "expires_in_seconds": number,
  "next_step": "string"
}}

Rules:
- Accept {token} only.
- Quote the requested liters and fuel_type for the requesting car_id.
- Stay at or below max_price_per_liter_usd where possible.
- total_usd is exactly liters * price_per_liter_usd.
- payment_address looks like a blockchain address (a mock is fine).
- payment_memo is a short unique id such as "car-001:INV-1234".
- next_step tells the car to send the exact {token} amount to the address with the memo."#,
        token = token
    )
}
