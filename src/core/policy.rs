//! Severity-to-commercial-parameter policy.
//!
//! Three fixed bands map a refill severity to acceptable liters, maximum
//! price per liter, delivery deadline and priority. Validation only checks
//! membership in the band; generators may pick any value inside it.

use crate::domain::{FuelRequest, Priority, Severity};

use super::error::PolicyError;

/// Slack for float comparisons at band edges
const BAND_TOLERANCE: f64 = 1e-9;

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min - BAND_TOLERANCE && value <= self.max + BAND_TOLERANCE
    }

    /// Centre of the range
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyBand {
    pub severity: Severity,
    pub liters: Span,
    pub max_price_per_liter_usd: Span,
    pub delivery_deadline_minutes: Span,
    pub priority: Priority,
}

pub const HIGH: PolicyBand = PolicyBand {
    severity: Severity::High,
    liters: Span::new(35.0, 45.0),
    max_price_per_liter_usd: Span::new(2.2, 2.8),
    delivery_deadline_minutes: Span::new(10.0, 15.0),
    priority: Priority::Fastest,
};

pub const MEDIUM: PolicyBand = PolicyBand {
    severity: Severity::Medium,
    liters: Span::new(20.0, 30.0),
    max_price_per_liter_usd: Span::new(1.8, 2.4),
    delivery_deadline_minutes: Span::new(15.0, 25.0),
    priority: Priority::Balanced,
};

pub const LOW: PolicyBand = PolicyBand {
    severity: Severity::Low,
    liters: Span::new(10.0, 20.0),
    max_price_per_liter_usd: Span::new(1.4, 2.0),
    delivery_deadline_minutes: Span::new(25.0, 40.0),
    priority: Priority::Cheapest,
};

/// All bands, most urgent first
pub const BANDS: [PolicyBand; 3] = [HIGH, MEDIUM, LOW];

/// Band for a severity
pub fn band_for(severity: Severity) -> &'static PolicyBand {
    match severity {
        Severity::High => &HIGH,
        Severity::Medium => &MEDIUM,
        Severity::Low => &LOW,
    }
}

/// Band for a declared severity label; unknown labels are rejected
pub fn band_for_label(label: &str) -> Result<&'static PolicyBand, PolicyError> {
    Severity::from_label(label)
        .map(band_for)
        .ok_or_else(|| PolicyError::UnknownSeverity(label.to_string()))
}

impl PolicyBand {
    /// Check a purchase request against this band
    pub fn check(&self, request: &FuelRequest) -> Result<(), PolicyError> {
        self.check_span("liters", self.liters, request.liters)?;
        self.check_span(
            "max_price_per_liter_usd",
            self.max_price_per_liter_usd,
            request.max_price_per_liter_usd,
        )?;
        self.check_span(
            "delivery_deadline_minutes",
            self.delivery_deadline_minutes,
            request.delivery_deadline_minutes,
        )?;

        if request.policy.priority != self.priority.as_str() {
            return Err(self.violation(
                "policy.priority",
                request.policy.priority.clone(),
                self.priority.to_string(),
            ));
        }

        let mentions_severity = mentions_word(&request.reason, self.severity.as_str());
        let mentions_priority = mentions_word(&request.reason, self.priority.as_str());
        if !mentions_severity || !mentions_priority {
            return Err(self.violation(
                "reason",
                request.reason.clone(),
                format!("a reason mentioning {} and {}", self.severity, self.priority),
            ));
        }

        Ok(())
    }

    fn check_span(&self, field: &'static str, span: Span, value: f64) -> Result<(), PolicyError> {
        if span.contains(value) {
            Ok(())
        } else {
            Err(self.violation(field, value.to_string(), span.to_string()))
        }
    }

    fn violation(&self, field: &'static str, value: String, expected: String) -> PolicyError {
        PolicyError::PolicyBandViolation {
            severity: self.severity,
            field,
            value,
            expected,
        }
    }
}

/// Whole-word, case-insensitive match ("low" does not match "below")
fn mentions_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case(word))
}

/// Resolve the declared severity and check the request against its band
pub fn check_request(request: &FuelRequest) -> Result<&'static PolicyBand, PolicyError> {
    let band = band_for_label(&request.policy.severity)?;
    band.check(request)?;
    Ok(band)
}
