//! Schema validation for stage outputs.
//!
//! Parses raw stage text, checks the `event` discriminator against the
//! kinds allowed at the current step, then walks the field table for that
//! kind and reports the first missing or mistyped field. Domain rules
//! (policy bands, arithmetic) are checked elsewhere.

use serde_json::{Map, Value};

use crate::domain::{Event, EventKind, FuelType};

use super::error::SchemaError;

/// Expected JSON type of a field
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    String,
    Number,
    /// String restricted to a fixed label set
    OneOf(&'static [&'static str]),
    /// Nested object with its own field table
    Object(&'static [FieldSpec]),
}

impl FieldType {
    fn describe(&self) -> String {
        match self {
            FieldType::String => "a string".to_string(),
            FieldType::Number => "a number".to_string(),
            FieldType::OneOf(labels) => format!("one of {}", labels.join(" | ")),
            FieldType::Object(_) => "an object".to_string(),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::OneOf(labels) => value.as_str().is_some_and(|s| labels.contains(&s)),
            FieldType::Object(_) => value.is_object(),
        }
    }
}

/// One entry of an event's field table
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        required: true,
    }
}

const fn optional(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        required: false,
    }
}

const SEVERITY_LABELS: &[&str] = &["LOW", "MEDIUM", "HIGH"];

const LOCATION: &[FieldSpec] = &[
    required("lat", FieldType::Number),
    required("lon", FieldType::Number),
];

// Severity and priority stay plain strings here; the policy gate owns them.
const POLICY: &[FieldSpec] = &[
    required("severity", FieldType::String),
    required("priority", FieldType::String),
];

const FUEL_OK: &[FieldSpec] = &[
    required("car_id", FieldType::String),
    optional("timestamp", FieldType::String),
    optional("fuel_level_percent", FieldType::Number),
    optional("range_km_estimate", FieldType::Number),
];

const FUEL_LOW_DETECTED: &[FieldSpec] = &[
    required("car_id", FieldType::String),
    required("timestamp", FieldType::String),
    required("location", FieldType::Object(LOCATION)),
    required("odometer_km", FieldType::Number),
    required("fuel_level_percent", FieldType::Number),
    required("range_km_estimate", FieldType::Number),
    required("severity", FieldType::OneOf(SEVERITY_LABELS)),
];

const NO_ACTION: &[FieldSpec] = &[
    required("car_id", FieldType::String),
    required("reason", FieldType::String),
];

const FUEL_REQUEST: &[FieldSpec] = &[
    required("car_id", FieldType::String),
    required("timestamp", FieldType::String),
    required("location", FieldType::Object(LOCATION)),
    required("fuel_type", FieldType::OneOf(FuelType::LABELS)),
    required("liters", FieldType::Number),
    required("max_price_per_liter_usd", FieldType::Number),
    required("payment_token", FieldType::String),
    required("delivery_deadline_minutes", FieldType::Number),
    required("policy", FieldType::Object(POLICY)),
    required("reason", FieldType::String),
];

const FUEL_QUOTE: &[FieldSpec] = &[
    required("station_id", FieldType::String),
    required("timestamp", FieldType::String),
    required("car_id", FieldType::String),
    required("fuel_type", FieldType::String),
    required("liters", FieldType::Number),
    required("price_per_liter_usd", FieldType::Number),
    required("total_usd", FieldType::Number),
    required("payment_token", FieldType::String),
    required("payment_address", FieldType::String),
    required("payment_memo", FieldType::String),
    required("expires_in_seconds", FieldType::Number),
    required("next_step", FieldType::String),
];

/// Field table for an event kind
pub fn fields_for(kind: EventKind) -> &'static [FieldSpec] {
    match kind {
        EventKind::FuelOk => FUEL_OK,
        EventKind::FuelLowDetected => FUEL_LOW_DETECTED,
        EventKind::NoAction => NO_ACTION,
        EventKind::FuelRequest => FUEL_REQUEST,
        EventKind::FuelQuote => FUEL_QUOTE,
    }
}

/// Validate raw stage output against the schemas of the allowed kinds.
///
/// Pure: the same input always yields the same result.
pub fn validate(raw: &str, expected: &[EventKind]) -> Result<Event, SchemaError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| SchemaError::MalformedJson {
        raw: raw.to_string(),
        message: e.to_string(),
    })?;

    let kind = discriminator(&value, expected)?;

    // discriminator() only succeeds on objects
    if let Some(object) = value.as_object() {
        check_fields(object, fields_for(kind), "")?;
    }

    serde_json::from_value(value).map_err(|e| SchemaError::Decode(e.to_string()))
}

fn discriminator(value: &Value, expected: &[EventKind]) -> Result<EventKind, SchemaError> {
    let tag = value.as_object().and_then(|o| o.get("event"));

    let found = match tag {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(SchemaError::UnexpectedEventKind {
                expected: expected.to_vec(),
                found: Some(other.to_string()),
            })
        }
        None => {
            return Err(SchemaError::UnexpectedEventKind {
                expected: expected.to_vec(),
                found: None,
            })
        }
    };

    EventKind::from_wire(&found)
        .filter(|kind| expected.contains(kind))
        .ok_or(SchemaError::UnexpectedEventKind {
            expected: expected.to_vec(),
            found: Some(found),
        })
}

fn check_fields(
    object: &Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
) -> Result<(), SchemaError> {
    for spec in fields {
        let path = format!("{}{}", prefix, spec.name);

        let value = match object.get(spec.name) {
            Some(Value::Null) | None if !spec.required => continue,
            Some(value) => value,
            None => {
                return Err(SchemaError::MissingOrWrongTypeField {
                    field: path,
                    expected: spec.ty.describe(),
                })
            }
        };

        if !spec.ty.matches(value) {
            return Err(SchemaError::MissingOrWrongTypeField {
                field: path,
                expected: spec.ty.describe(),
            });
        }

        if let (FieldType::Object(nested), Value::Object(inner)) = (spec.ty, value) {
            check_fields(inner, nested, &format!("{}.", path))?;
        }
    }

    Ok(())
}
