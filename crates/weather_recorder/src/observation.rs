//! Observation value type and api.weather.gov payload parsing.
//!
//! The station API reports every measurement as `{"value": <number|null>, ...}`
//! under a top-level `properties` object. Missing or null readings are
//! replaced by a sentinel so that a partial observation still parses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::FetchError;

/// Sentinel for an unavailable temperature, wind or dew point reading.
pub const MISSING: f64 = -999.0;

/// Sentinel for an unavailable pressure or humidity reading.
///
/// A pressure equal to this value marks the whole observation as invalid.
pub const MISSING_RATIO: f64 = -1.0;

/// One weather reading tied to a single observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Observation time, the natural key of a stored record.
    pub time: DateTime<Utc>,
    /// The `@id` URL the API assigned to this observation, when present.
    pub source_id: Option<String>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Pascals.
    pub pressure: f64,
    /// Percent.
    pub humidity: f64,
    /// Kilometres per hour.
    pub wind_speed: f64,
    /// Degrees from north.
    pub wind_direction: f64,
    /// Degrees Celsius.
    pub dew_point: f64,
}

impl Observation {
    /// Parse an observation from the JSON body of the `observations/latest` endpoint.
    ///
    /// Absent or null measurements become sentinels. A body without a
    /// `properties` object or a parseable `timestamp` is a contract change
    /// and yields [`FetchError::Parse`].
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let response: ObservationResponse =
            serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
        let props = response.properties;

        let time = DateTime::parse_from_rfc3339(&props.timestamp)
            .map_err(|e| FetchError::Parse(format!("timestamp '{}': {e}", props.timestamp)))?
            .with_timezone(&Utc);

        Ok(Self {
            time,
            source_id: props.id,
            temperature: reading(props.temperature, MISSING),
            pressure: reading(props.barometric_pressure, MISSING_RATIO),
            humidity: reading(props.relative_humidity, MISSING_RATIO),
            wind_speed: reading(props.wind_speed, MISSING),
            wind_direction: reading(props.wind_direction, MISSING),
            dew_point: reading(props.dewpoint, MISSING),
        })
    }

    /// Whether the station actually reported. A missing pressure means it did not.
    pub fn is_reporting(&self) -> bool {
        self.pressure != MISSING_RATIO
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} temp={} pressure={} humidity={} wind={}@{} dew_point={}",
            self.time.to_rfc3339(),
            self.temperature,
            self.pressure,
            self.humidity,
            self.wind_speed,
            self.wind_direction,
            self.dew_point
        )
    }
}

fn reading(measurement: Option<Measurement>, sentinel: f64) -> f64 {
    measurement.and_then(|m| m.value).unwrap_or(sentinel)
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    #[serde(rename = "@id", default)]
    id: Option<String>,
    timestamp: String,
    #[serde(default)]
    temperature: Option<Measurement>,
    #[serde(default)]
    barometric_pressure: Option<Measurement>,
    #[serde(default)]
    relative_humidity: Option<Measurement>,
    #[serde(default)]
    wind_speed: Option<Measurement>,
    #[serde(default)]
    wind_direction: Option<Measurement>,
    #[serde(default)]
    dewpoint: Option<Measurement>,
}

#[derive(Debug, Deserialize)]
struct Measurement {
    #[serde(default)]
    value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FULL: &str = r#"{
        "properties": {
            "@id": "https://api.weather.gov/stations/KDLZ/observations/2024-01-01T00:00:00+00:00",
            "timestamp": "2024-01-01T00:00:00Z",
            "temperature": {"unitCode": "wmoUnit:degC", "value": 5.0},
            "barometricPressure": {"unitCode": "wmoUnit:Pa", "value": 101325},
            "relativeHumidity": {"unitCode": "wmoUnit:percent", "value": 50},
            "windSpeed": {"unitCode": "wmoUnit:km_h-1", "value": 3},
            "windDirection": {"unitCode": "wmoUnit:degree_(angle)", "value": 180},
            "dewpoint": {"unitCode": "wmoUnit:degC", "value": -2}
        }
    }"#;

    #[test]
    fn parses_full_observation() {
        let obs = Observation::from_json(FULL).unwrap();
        assert_eq!(obs.time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(obs.temperature, 5.0);
        assert_eq!(obs.pressure, 101325.0);
        assert_eq!(obs.humidity, 50.0);
        assert_eq!(obs.wind_speed, 3.0);
        assert_eq!(obs.wind_direction, 180.0);
        assert_eq!(obs.dew_point, -2.0);
        assert!(obs.source_id.unwrap().ends_with("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn null_values_become_sentinels() {
        let body = r#"{"properties": {
            "timestamp": "2024-01-01T00:00:00+00:00",
            "temperature": {"value": null},
            "barometricPressure": {"value": null},
            "relativeHumidity": {"value": null},
            "windSpeed": {"value": null},
            "windDirection": {"value": null},
            "dewpoint": {"value": null}
        }}"#;
        let obs = Observation::from_json(body).unwrap();
        assert_eq!(obs.temperature, MISSING);
        assert_eq!(obs.pressure, MISSING_RATIO);
        assert_eq!(obs.humidity, MISSING_RATIO);
        assert_eq!(obs.wind_speed, MISSING);
        assert_eq!(obs.wind_direction, MISSING);
        assert_eq!(obs.dew_point, MISSING);
        assert!(!obs.is_reporting());
    }

    #[test]
    fn absent_fields_become_sentinels() {
        let body = r#"{"properties": {
            "timestamp": "2024-01-01T00:00:00Z",
            "barometricPressure": {"value": 100000}
        }}"#;
        let obs = Observation::from_json(body).unwrap();
        assert_eq!(obs.temperature, MISSING);
        assert_eq!(obs.pressure, 100000.0);
        assert_eq!(obs.source_id, None);
        assert!(obs.is_reporting());
    }

    #[test]
    fn zero_is_a_real_reading() {
        let body = r#"{"properties": {
            "timestamp": "2024-01-01T00:00:00Z",
            "temperature": {"value": 0},
            "barometricPressure": {"value": 101000},
            "windSpeed": {"value": 0}
        }}"#;
        let obs = Observation::from_json(body).unwrap();
        assert_eq!(obs.temperature, 0.0);
        assert_eq!(obs.wind_speed, 0.0);
    }

    #[test]
    fn offset_timestamps_normalise_to_utc() {
        let body = r#"{"properties": {"timestamp": "2024-01-01T05:00:00+05:00"}}"#;
        let obs = Observation::from_json(body).unwrap();
        assert_eq!(obs.time, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn missing_properties_is_parse_error() {
        let err = Observation::from_json(r#"{"type": "Feature"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn missing_timestamp_is_parse_error() {
        let err = Observation::from_json(r#"{"properties": {}}"#).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn malformed_timestamp_is_parse_error() {
        let err =
            Observation::from_json(r#"{"properties": {"timestamp": "yesterday"}}"#).unwrap_err();
        match err {
            FetchError::Parse(msg) => assert!(msg.contains("yesterday")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_parse_error() {
        let err = Observation::from_json("<html>maintenance</html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn display_includes_time_and_readings() {
        let obs = Observation::from_json(FULL).unwrap();
        let text = obs.to_string();
        assert!(text.starts_with("2024-01-01T00:00:00+00:00"));
        assert!(text.contains("pressure=101325"));
    }
}
