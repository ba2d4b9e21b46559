//! Sensor reading types and payload coercion.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::ApiError;

/// One stored sample from the heart-rate sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    /// Raw infrared amplitude.
    #[serde(serialize_with = "serialize_number")]
    pub ir_value: Option<f64>,
    /// Instantaneous heart rate.
    #[serde(serialize_with = "serialize_number")]
    pub bpm: Option<f64>,
    /// Averaged heart rate.
    #[serde(serialize_with = "serialize_number")]
    pub avg_bpm: Option<f64>,
    /// When the reading was stored; the ordering key.
    pub created_at: DateTime<Utc>,
}

impl SensorReading {
    /// Stamp values with the current time.
    ///
    /// Truncated to microseconds, the resolution the SQLite store keeps.
    pub fn now(values: ReadingValues) -> Self {
        Self::at(values, Utc::now().trunc_subsecs(6))
    }

    /// Stamp values with an explicit time.
    pub fn at(values: ReadingValues, created_at: DateTime<Utc>) -> Self {
        Self {
            ir_value: values.ir_value,
            bpm: values.bpm,
            avg_bpm: values.avg_bpm,
            created_at,
        }
    }
}

/// Largest integer an f64 holds exactly (2^53 - 1).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Whole values go out as JSON integers (`512`, not `512.0`).
fn serialize_number<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match *value {
        Some(v) if v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER => {
            serializer.serialize_i64(v as i64)
        }
        Some(v) => serializer.serialize_f64(v),
        None => serializer.serialize_none(),
    }
}

/// The three numeric fields of a reading, before it is timestamped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadingValues {
    /// Raw infrared amplitude.
    pub ir_value: Option<f64>,
    /// Instantaneous heart rate.
    pub bpm: Option<f64>,
    /// Averaged heart rate.
    pub avg_bpm: Option<f64>,
}

/// Body of `POST /sensor-data` as sent by the device.
///
/// Fields stay untyped until the key has been checked.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    /// Raw infrared amplitude.
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub ir_value: Option<Value>,
    /// Instantaneous heart rate.
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub bpm: Option<Value>,
    /// Averaged heart rate.
    #[serde(default)]
    #[schema(value_type = Option<f64>)]
    pub avg_bpm: Option<Value>,
    /// Shared secret.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub api_key: Option<Value>,
}

impl IngestRequest {
    /// Parse a request body. An empty body is treated as `{}`.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    /// The presented key, if it is a string at all.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().and_then(Value::as_str)
    }

    /// Coerce the three numeric fields.
    ///
    /// Lenient mode accepts numbers, numeric strings and booleans, and treats
    /// null or empty strings as absent. Strict mode additionally requires every
    /// field to be present, finite and non-negative.
    pub fn values(&self, strict: bool) -> Result<ReadingValues, ApiError> {
        let values = ReadingValues {
            ir_value: coerce_number("irValue", self.ir_value.as_ref())?,
            bpm: coerce_number("bpm", self.bpm.as_ref())?,
            avg_bpm: coerce_number("avgBpm", self.avg_bpm.as_ref())?,
        };

        if strict {
            for (field, value) in [
                ("irValue", values.ir_value),
                ("bpm", values.bpm),
                ("avgBpm", values.avg_bpm),
            ] {
                check_strict(field, value)?;
            }
        }

        Ok(values)
    }
}

fn coerce_number(field: &str, value: Option<&Value>) -> Result<Option<f64>, ApiError> {
    let invalid = || ApiError::BadRequest(format!("{field} is not a number"));

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(invalid),
        Some(Value::Bool(b)) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(invalid()),
            }
        }
        Some(_) => Err(invalid()),
    }
}

fn check_strict(field: &str, value: Option<f64>) -> Result<(), ApiError> {
    match value {
        None => Err(ApiError::BadRequest(format!("{field} is required"))),
        Some(v) if !v.is_finite() || v < 0.0 => Err(ApiError::BadRequest(format!(
            "{field} must be a non-negative number"
        ))),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(body: Value) -> IngestRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn numbers_pass_through() {
        let req = request(json!({"irValue": 512, "bpm": 72.5, "avgBpm": 70, "apiKey": "k"}));
        let values = req.values(false).unwrap();
        assert_eq!(
            values,
            ReadingValues {
                ir_value: Some(512.0),
                bpm: Some(72.5),
                avg_bpm: Some(70.0),
            }
        );
        assert_eq!(req.api_key(), Some("k"));
    }

    #[test]
    fn lenient_mode_coerces_strings_and_booleans() {
        let req = request(json!({"irValue": " 512 ", "bpm": true, "avgBpm": ""}));
        let values = req.values(false).unwrap();
        assert_eq!(values.ir_value, Some(512.0));
        assert_eq!(values.bpm, Some(1.0));
        assert_eq!(values.avg_bpm, None);
    }

    #[test]
    fn missing_fields_are_absent_not_rejected() {
        let req = request(json!({"apiKey": "k"}));
        assert_eq!(req.values(false).unwrap(), ReadingValues::default());
    }

    #[test]
    fn uncoercible_values_are_bad_requests() {
        let req = request(json!({"irValue": "abc"}));
        assert!(matches!(req.values(false), Err(ApiError::BadRequest(_))));

        let req = request(json!({"bpm": [1, 2]}));
        assert!(matches!(req.values(false), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn strict_mode_requires_non_negative_values() {
        let req = request(json!({"irValue": 512, "bpm": 72}));
        assert!(matches!(req.values(true), Err(ApiError::BadRequest(_))));

        let req = request(json!({"irValue": 512, "bpm": -1, "avgBpm": 70}));
        assert!(matches!(req.values(true), Err(ApiError::BadRequest(_))));

        let req = request(json!({"irValue": 512, "bpm": 72, "avgBpm": 70}));
        assert!(req.values(true).is_ok());
    }

    #[test]
    fn non_string_api_key_is_treated_as_missing() {
        let req = request(json!({"apiKey": 1234}));
        assert_eq!(req.api_key(), None);
    }

    #[test]
    fn empty_body_parses_as_empty_request() {
        let req = IngestRequest::from_body(b"").unwrap();
        assert!(req.api_key().is_none());
        assert!(matches!(
            IngestRequest::from_body(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn reading_serializes_with_camel_case_fields() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let reading = SensorReading::at(
            ReadingValues {
                ir_value: Some(512.0),
                bpm: Some(72.0),
                avg_bpm: None,
            },
            created_at,
        );
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            json!({
                "irValue": 512,
                "bpm": 72,
                "avgBpm": null,
                "createdAt": "2023-11-14T22:13:20Z",
            })
        );
    }

    #[test]
    fn fractional_values_keep_their_fraction() {
        let created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let reading = SensorReading::at(
            ReadingValues {
                ir_value: Some(512.25),
                bpm: Some(-3.0),
                avg_bpm: Some(1e300),
            },
            created_at,
        );
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains(r#""irValue":512.25"#));
        assert!(json.contains(r#""bpm":-3,"#));
        assert!(json.contains(r#""avgBpm":1e300"#));

        let back: SensorReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }
}
