//! Availability response normalization.
//!
//! Upstream deployments disagree on field names and sometimes wrap the
//! answer in a one-element array or send booleans as strings.

use serde_json::Value;

use super::{AvailabilityResult, ToolError};
use crate::core::conversation::TimeOfDay;

/// Field spellings for the "slot is taken" flag, highest priority first.
const UNAVAILABLE_FIELDS: &[&str] = &[
    "unavailable",
    "is_unavailable",
    "isUnavailable",
    "booked",
    "is_booked",
    "isBooked",
    "full",
    "result",
];

/// Field spellings for the canonical time.
const TIME_FIELDS: &[&str] = &["time", "normalized_time", "normalizedTime", "slot"];

const MESSAGE_FIELDS: &[&str] = &["message", "msg", "detail"];

/// Normalize a lookup response body.
///
/// Missing availability means available; missing time means `requested`.
pub fn normalize_response(
    body: &Value,
    requested: TimeOfDay,
) -> Result<AvailabilityResult, ToolError> {
    let record = match body {
        Value::Array(items) => items
            .first()
            .ok_or_else(|| ToolError::InvalidResponse("empty array".to_string()))?,
        other => other,
    };

    let Some(object) = record.as_object() else {
        return Err(ToolError::InvalidResponse(format!(
            "expected an object, got {}",
            kind_of(record)
        )));
    };

    let unavailable = UNAVAILABLE_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(as_flag))
        .unwrap_or(false);

    let time = TIME_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(as_text))
        .unwrap_or_else(|| requested.to_string());

    let message = MESSAGE_FIELDS
        .iter()
        .find_map(|field| object.get(*field).and_then(as_text));

    Ok(AvailabilityResult {
        unavailable,
        time,
        message,
    })
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seven_pm() -> TimeOfDay {
        TimeOfDay::new(19, 0).unwrap()
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let result = normalize_response(&json!({}), seven_pm()).unwrap();
        assert!(!result.unavailable);
        assert_eq!(result.time, "19:00");
        assert_eq!(result.message, None);
    }

    #[test]
    fn test_field_priority() {
        let body = json!({"booked": false, "unavailable": true, "result": false});
        assert!(normalize_response(&body, seven_pm()).unwrap().unavailable);

        let body = json!({"slot": "19:30", "normalizedTime": "19:15"});
        assert_eq!(normalize_response(&body, seven_pm()).unwrap().time, "19:15");
    }

    #[test]
    fn test_string_booleans_and_skipped_values() {
        let body = json!({"isUnavailable": "TRUE"});
        assert!(normalize_response(&body, seven_pm()).unwrap().unavailable);

        // An unparseable higher-priority field falls through to the next one.
        let body = json!({"unavailable": "maybe", "full": true});
        assert!(normalize_response(&body, seven_pm()).unwrap().unavailable);
    }

    #[test]
    fn test_array_unwraps_first_element() {
        let body = json!([{"is_booked": true, "msg": "taken"}, {"is_booked": false}]);
        let result = normalize_response(&body, seven_pm()).unwrap();
        assert!(result.unavailable);
        assert_eq!(result.message.as_deref(), Some("taken"));
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(
            normalize_response(&json!([]), seven_pm()),
            Err(ToolError::InvalidResponse(_))
        ));
        assert!(matches!(
            normalize_response(&json!("ok"), seven_pm()),
            Err(ToolError::InvalidResponse(_))
        ));
    }
}
