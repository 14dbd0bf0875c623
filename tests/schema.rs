//! Schema Validation Integration Tests
//!
//! Tests for per-hop event schemas and their error classification.

use refuel::core::{schema, SchemaError};
use refuel::domain::{Event, EventKind, FuelType, Severity};

const LOW_FUEL: &str = r#"{
  "event": "FUEL_LOW_DETECTED",
  "car_id": "car-001",
  "timestamp": "2026-03-01T12:00:00+00:00",
  "location": {"lat": -23.5505, "lon": -46.6333},
  "odometer_km": 48211,
  "fuel_level_percent": 18,
  "range_km_estimate": 108,
  "severity": "MEDIUM"
}"#;

const QUOTE: &str = r#"{
  "event": "FUEL_QUOTE",
  "station_id": "station-777",
  "timestamp": "2026-03-01T12:00:05+00:00",
  "car_id": "car-001",
  "fuel_type": "GASOLINE",
  "liters": 25,
  "price_per_liter_usd": 2.0,
  "total_usd": 50.0,
  "payment_token": "USDC",
  "payment_address": "0xabc",
  "payment_memo": "car-001:INV-0001",
  "expires_in_seconds": 900,
  "next_step": "pay"
}"#;

#[test]
fn test_validation_is_idempotent() {
    let first = schema::validate(LOW_FUEL, EventKind::SENSOR);
    let second = schema::validate(LOW_FUEL, EventKind::SENSOR);
    assert_eq!(first, second);

    let bad = r#"{"event":"FUEL_LOW_DETECTED","car_id":"car-001"}"#;
    assert_eq!(
        schema::validate(bad, EventKind::SENSOR),
        schema::validate(bad, EventKind::SENSOR)
    );
}

const REQUEST: &str = r#"{
  "event": "FUEL_REQUEST",
  "car_id": "car-001",
  "timestamp": "2026-03-01T12:00:00+00:00",
  "location": {"lat": -23.5505, "lon": -46.6333},
  "fuel_type": "ETHANOL",
  "liters": 25,
  "max_price_per_liter_usd": 2.1,
  "payment_token": "USDC",
  "delivery_deadline_minutes": 20,
  "policy": {"severity": "MEDIUM", "priority": "BALANCED"},
  "reason": "MEDIUM severity, BALANCED priority"
}"#;

#[test]
fn test_round_trip_yields_identical_event() {
    let cases = [
        (LOW_FUEL, EventKind::SENSOR),
        (r#"{"event":"FUEL_OK","car_id":"car-001"}"#, EventKind::SENSOR),
        (
            r#"{"event":"FUEL_OK","car_id":"car-001","timestamp":null,"fuel_level_percent":72,"range_km_estimate":null}"#,
            EventKind::SENSOR,
        ),
        (
            r#"{"event":"NO_ACTION","car_id":"car-001","reason":"Fuel level OK"}"#,
            EventKind::DECISION,
        ),
        (REQUEST, EventKind::DECISION),
        (QUOTE, EventKind::QUOTE),
    ];

    for (raw, kinds) in cases {
        let event = schema::validate(raw, kinds).unwrap();
        let text = event.to_json().unwrap();
        assert_eq!(schema::validate(&text, kinds).unwrap(), event, "{}", raw);
    }
}

#[test]
fn test_request_nested_fields_survive_round_trip() {
    let event = schema::validate(REQUEST, EventKind::DECISION).unwrap();
    let text = event.to_json().unwrap();

    match schema::validate(&text, EventKind::DECISION).unwrap() {
        Event::FuelRequest(request) => {
            assert_eq!(request.fuel_type, FuelType::Ethanol);
            assert_eq!(request.location.lat, -23.5505);
            assert_eq!(request.policy.severity, "MEDIUM");
            assert_eq!(request.policy.priority, "BALANCED");
        }
        other => panic!("Expected FUEL_REQUEST, got {:?}", other),
    }

    // Absent optional fields stay absent on the wire
    let ok = schema::validate(
        r#"{"event":"FUEL_OK","car_id":"car-001","timestamp":null}"#,
        EventKind::SENSOR,
    )
    .unwrap();
    assert_eq!(ok.to_json().unwrap(), r#"{"event":"FUEL_OK","car_id":"car-001"}"#);
}

#[test]
fn test_fuel_ok_needs_only_car_id() {
    let event = schema::validate(r#"{"event":"FUEL_OK","car_id":"car-001"}"#, EventKind::SENSOR).unwrap();
    assert_eq!(event.kind(), EventKind::FuelOk);
    assert_eq!(event.car_id(), "car-001");
}

#[test]
fn test_extra_fields_are_ignored() {
    let raw = r#"{"event":"NO_ACTION","car_id":"car-001","reason":"Fuel level OK","confidence":0.9}"#;
    assert!(matches!(
        schema::validate(raw, EventKind::DECISION),
        Ok(Event::NoAction(_))
    ));
}

#[test]
fn test_malformed_json_keeps_raw_text() {
    let raw = "```json\n{\"event\": \"FUEL_OK\"}\n```";
    match schema::validate(raw, EventKind::SENSOR) {
        Err(SchemaError::MalformedJson { raw: kept, .. }) => assert_eq!(kept, raw),
        other => panic!("Expected MalformedJson, got {:?}", other),
    }
}

#[test]
fn test_wrong_kind_for_hop() {
    match schema::validate(QUOTE, EventKind::SENSOR) {
        Err(SchemaError::UnexpectedEventKind { expected, found }) => {
            assert_eq!(expected, EventKind::SENSOR.to_vec());
            assert_eq!(found.as_deref(), Some("FUEL_QUOTE"));
        }
        other => panic!("Expected UnexpectedEventKind, got {:?}", other),
    }

    // JSON that is not an object has no discriminator
    assert!(matches!(
        schema::validate("[1, 2, 3]", EventKind::QUOTE),
        Err(SchemaError::UnexpectedEventKind { found: None, .. })
    ));
}

#[test]
fn test_missing_and_mistyped_fields() {
    let missing = QUOTE.replace("\"payment_memo\": \"car-001:INV-0001\",", "");
    assert_eq!(
        schema::validate(&missing, EventKind::QUOTE),
        Err(SchemaError::MissingOrWrongTypeField {
            field: "payment_memo".to_string(),
            expected: "a string".to_string(),
        })
    );

    let mistyped = QUOTE.replace("\"liters\": 25", "\"liters\": \"25\"");
    assert!(matches!(
        schema::validate(&mistyped, EventKind::QUOTE),
        Err(SchemaError::MissingOrWrongTypeField { ref field, .. }) if field == "liters"
    ));

    let nested = LOW_FUEL.replace("\"lon\": -46.6333", "\"lon\": null");
    assert!(matches!(
        schema::validate(&nested, EventKind::SENSOR),
        Err(SchemaError::MissingOrWrongTypeField { ref field, .. }) if field == "location.lon"
    ));
}

#[test]
fn test_sensor_severity_must_be_a_known_label() {
    let raw = LOW_FUEL.replace("\"MEDIUM\"", "\"SEVERE\"");
    assert!(matches!(
        schema::validate(&raw, EventKind::SENSOR),
        Err(SchemaError::MissingOrWrongTypeField { ref field, .. }) if field == "severity"
    ));
}

#[test]
fn test_severity_thresholds() {
    assert_eq!(Severity::for_fuel_level(0.0), Severity::High);
    assert_eq!(Severity::for_fuel_level(9.99), Severity::High);
    assert_eq!(Severity::for_fuel_level(10.0), Severity::Medium);
    assert_eq!(Severity::for_fuel_level(25.0), Severity::Medium);
    assert_eq!(Severity::for_fuel_level(25.01), Severity::Low);
    assert_eq!(Severity::for_fuel_level(80.0), Severity::Low);
}
