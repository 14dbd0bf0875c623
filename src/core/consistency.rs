//! Cross-field checks between hand-offs.
//!
//! The schema validator guarantees shape; these checks guarantee that each
//! event agrees with the one it answers and with the settlement token.

use chrono::DateTime;
use tracing::warn;

use crate::domain::{Event, FuelLow, FuelQuote, FuelRequest, Severity};

use super::error::ConsistencyViolation;

/// Absolute tolerance for `total_usd == liters * price_per_liter_usd`
pub const TOTAL_TOLERANCE: f64 = 1e-6;

/// Sensor severity must follow the fuel-level thresholds.
///
/// A mismatch is only fatal when `strict` is set; otherwise it is logged.
pub fn check_sensor(sensor: &FuelLow, strict: bool) -> Result<(), ConsistencyViolation> {
    let expected = Severity::for_fuel_level(sensor.fuel_level_percent);
    if expected == sensor.severity {
        return Ok(());
    }

    let violation = ConsistencyViolation::SeverityMismatch {
        declared: sensor.severity,
        expected,
        fuel_level_percent: sensor.fuel_level_percent,
    };

    if strict {
        return Err(violation);
    }

    warn!(
        declared = %sensor.severity,
        %expected,
        fuel_level_percent = sensor.fuel_level_percent,
        "Sensor severity disagrees with fuel level"
    );
    Ok(())
}

/// A purchase request must answer a low-fuel event and copy its identity
/// fields, and must name the settlement token.
pub fn check_request(
    sensor: &Event,
    request: &FuelRequest,
    settlement_token: &str,
) -> Result<FuelLow, ConsistencyViolation> {
    let low = match sensor {
        Event::FuelLowDetected(low) => low,
        _ => return Err(ConsistencyViolation::UnprovokedRequest),
    };

    check_token(settlement_token, &request.payment_token)?;

    if request.car_id != low.car_id {
        return Err(trace("car_id", &low.car_id, &request.car_id));
    }

    if !same_instant(&low.timestamp, &request.timestamp) {
        return Err(trace("timestamp", &low.timestamp, &request.timestamp));
    }

    if request.location != low.location {
        return Err(trace(
            "location",
            format!("({}, {})", low.location.lat, low.location.lon),
            format!("({}, {})", request.location.lat, request.location.lon),
        ));
    }

    Ok(low.clone())
}

/// Final checks on the counterparty quote.
///
/// Order: arithmetic, settlement token, payment instructions, then the
/// fields that must match the request.
pub fn check_quote(
    request: &FuelRequest,
    quote: &FuelQuote,
    settlement_token: &str,
) -> Result<(), ConsistencyViolation> {
    let expected = quote.liters * quote.price_per_liter_usd;
    if (quote.total_usd - expected).abs() > TOTAL_TOLERANCE {
        return Err(ConsistencyViolation::TotalMismatch {
            total: quote.total_usd,
            expected,
        });
    }

    check_token(settlement_token, &quote.payment_token)?;

    if quote.payment_address.trim().is_empty() {
        return Err(ConsistencyViolation::MissingPaymentField("payment_address"));
    }
    if quote.payment_memo.trim().is_empty() {
        return Err(ConsistencyViolation::MissingPaymentField("payment_memo"));
    }

    if (quote.liters - request.liters).abs() > TOTAL_TOLERANCE {
        return Err(trace(
            "liters",
            request.liters.to_string(),
            quote.liters.to_string(),
        ));
    }

    if !quote
        .fuel_type
        .eq_ignore_ascii_case(request.fuel_type.as_str())
    {
        return Err(trace("fuel_type", request.fuel_type.as_str(), &quote.fuel_type));
    }

    if quote.car_id != request.car_id {
        return Err(trace("car_id", &request.car_id, &quote.car_id));
    }

    if quote.price_per_liter_usd > request.max_price_per_liter_usd {
        warn!(
            price = quote.price_per_liter_usd,
            max = request.max_price_per_liter_usd,
            "Quoted price exceeds requested maximum"
        );
    }

    Ok(())
}

fn check_token(expected: &str, found: &str) -> Result<(), ConsistencyViolation> {
    if found == expected {
        Ok(())
    } else {
        Err(ConsistencyViolation::TokenMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}

fn trace(
    field: &'static str,
    expected: impl Into<String>,
    found: impl Into<String>,
) -> ConsistencyViolation {
    ConsistencyViolation::TraceMismatch {
        field,
        expected: expected.into(),
        found: found.into(),
    }
}

/// Compare ISO-8601 timestamps as instants, falling back to text equality
fn same_instant(a: &str, b: &str) -> bool {
    match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
