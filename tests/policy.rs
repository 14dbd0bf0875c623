//! Policy and Consistency Integration Tests
//!
//! Tests for severity bands and the cross-hop checks on requests and quotes.

use refuel::core::consistency;
use refuel::core::policy::{self, band_for, BANDS};
use refuel::core::{ConsistencyViolation, PolicyError};
use refuel::domain::{
    Event, FuelLow, FuelOk, FuelQuote, FuelRequest, FuelType, Location, PolicyTag, Priority,
    Severity,
};

fn low(level: f64) -> FuelLow {
    FuelLow {
        car_id: "car-001".to_string(),
        timestamp: "2026-03-01T12:00:00+00:00".to_string(),
        location: Location {
            lat: -23.5505,
            lon: -46.6333,
        },
        odometer_km: 48211.0,
        fuel_level_percent: level,
        range_km_estimate: 100.0,
        severity: Severity::for_fuel_level(level),
    }
}

/// Request at the centre of the band for `severity`
fn request(severity: Severity) -> FuelRequest {
    let band = band_for(severity);
    FuelRequest {
        car_id: "car-001".to_string(),
        timestamp: "2026-03-01T12:00:00Z".to_string(),
        location: Location {
            lat: -23.5505,
            lon: -46.6333,
        },
        fuel_type: FuelType::Gasoline,
        liters: band.liters.midpoint(),
        max_price_per_liter_usd: band.max_price_per_liter_usd.midpoint(),
        payment_token: "USDC".to_string(),
        delivery_deadline_minutes: band.delivery_deadline_minutes.midpoint(),
        policy: PolicyTag {
            severity: band.severity.to_string(),
            priority: band.priority.to_string(),
        },
        reason: format!("{} severity, {} priority", band.severity, band.priority),
    }
}

fn quote_for(request: &FuelRequest, price: f64) -> FuelQuote {
    FuelQuote {
        station_id: "station-777".to_string(),
        timestamp: "2026-03-01T12:00:05Z".to_string(),
        car_id: request.car_id.clone(),
        fuel_type: "gasoline".to_string(),
        liters: request.liters,
        price_per_liter_usd: price,
        total_usd: request.liters * price,
        payment_token: "USDC".to_string(),
        payment_address: "0xabc".to_string(),
        payment_memo: "car-001:INV-0001".to_string(),
        expires_in_seconds: 900.0,
        next_step: "pay".to_string(),
    }
}

#[test]
fn test_band_table() {
    let high = band_for(Severity::High);
    assert_eq!((high.liters.min, high.liters.max), (35.0, 45.0));
    assert_eq!(high.priority, Priority::Fastest);

    let medium = band_for(Severity::Medium);
    assert_eq!((medium.max_price_per_liter_usd.min, medium.max_price_per_liter_usd.max), (1.8, 2.4));
    assert_eq!(medium.priority, Priority::Balanced);

    let low = band_for(Severity::Low);
    assert_eq!(
        (low.delivery_deadline_minutes.min, low.delivery_deadline_minutes.max),
        (25.0, 40.0)
    );
    assert_eq!(low.priority, Priority::Cheapest);
}

#[test]
fn test_band_edges_are_inclusive() {
    for band in BANDS.iter() {
        let mut req = request(band.severity);

        req.liters = band.liters.min;
        assert!(policy::check_request(&req).is_ok());
        req.liters = band.liters.max;
        assert!(policy::check_request(&req).is_ok());

        req.liters = band.liters.max + 0.5;
        assert!(matches!(
            policy::check_request(&req),
            Err(PolicyError::PolicyBandViolation { field: "liters", .. })
        ));
    }
}

#[test]
fn test_priority_must_match_severity() {
    let mut req = request(Severity::Medium);
    req.policy.priority = "FASTEST".to_string();
    req.reason = "MEDIUM severity but FASTEST priority".to_string();

    match policy::check_request(&req) {
        Err(PolicyError::PolicyBandViolation {
            severity, field, ..
        }) => {
            assert_eq!(severity, Severity::Medium);
            assert_eq!(field, "policy.priority");
        }
        other => panic!("Expected priority violation, got {:?}", other),
    }
}

#[test]
fn test_reason_names_severity_and_priority() {
    let mut req = request(Severity::Low);
    req.reason = "cheap refill".to_string();
    assert!(matches!(
        policy::check_request(&req),
        Err(PolicyError::PolicyBandViolation { field: "reason", .. })
    ));

    // "below" is not "low"
    req.reason = "Fuel is below threshold; buying the cheapest option".to_string();
    assert!(matches!(
        policy::check_request(&req),
        Err(PolicyError::PolicyBandViolation { field: "reason", .. })
    ));
}

#[test]
fn test_request_traces_back_to_sensor() {
    let sensor = Event::FuelLowDetected(low(5.0));

    // Same instant written differently still matches
    assert!(consistency::check_request(&sensor, &request(Severity::High), "USDC").is_ok());

    let mut moved = request(Severity::High);
    moved.location.lat = 0.0;
    assert!(matches!(
        consistency::check_request(&sensor, &moved, "USDC"),
        Err(ConsistencyViolation::TraceMismatch { field: "location", .. })
    ));

    assert!(matches!(
        consistency::check_request(&sensor, &request(Severity::High), "BRZ"),
        Err(ConsistencyViolation::TokenMismatch { .. })
    ));
}

#[test]
fn test_request_answering_fuel_ok_is_rejected() {
    let sensor = Event::FuelOk(FuelOk {
        car_id: "car-001".to_string(),
        timestamp: None,
        fuel_level_percent: Some(80.0),
        range_km_estimate: None,
    });

    assert_eq!(
        consistency::check_request(&sensor, &request(Severity::Low), "USDC"),
        Err(ConsistencyViolation::UnprovokedRequest)
    );
}

#[test]
fn test_quote_checks() {
    let req = request(Severity::High);

    // Price above the maximum is tolerated; fuel type compares case-insensitively
    let pricey = quote_for(&req, req.max_price_per_liter_usd + 0.3);
    assert!(consistency::check_quote(&req, &pricey, "USDC").is_ok());

    let mut off = quote_for(&req, 2.5);
    off.total_usd += 0.01;
    assert!(matches!(
        consistency::check_quote(&req, &off, "USDC"),
        Err(ConsistencyViolation::TotalMismatch { .. })
    ));

    let mut no_memo = quote_for(&req, 2.5);
    no_memo.payment_memo = "  ".to_string();
    assert_eq!(
        consistency::check_quote(&req, &no_memo, "USDC"),
        Err(ConsistencyViolation::MissingPaymentField("payment_memo"))
    );

    let mut short = quote_for(&req, 2.5);
    short.liters -= 5.0;
    short.total_usd = short.liters * short.price_per_liter_usd;
    assert!(matches!(
        consistency::check_quote(&req, &short, "USDC"),
        Err(ConsistencyViolation::TraceMismatch { field: "liters", .. })
    ));
}

#[test]
fn test_sensor_severity_mismatch_only_fails_when_strict() {
    let mut sensor = low(5.0);
    sensor.severity = Severity::Low;

    assert!(consistency::check_sensor(&sensor, false).is_ok());
    assert!(matches!(
        consistency::check_sensor(&sensor, true),
        Err(ConsistencyViolation::SeverityMismatch {
            declared: Severity::Low,
            expected: Severity::High,
            ..
        })
    ));
}
