//! TelemetryReport - TelemetryLoop output
//!
//! Synthetic position report published once per tick.

use serde::{Deserialize, Serialize};

/// Position report
///
/// Serialized as a flat object: `{"lat": .., "lon": .., "alt": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    /// Latitude (degrees)
    #[serde(rename = "lat")]
    pub latitude: f64,

    /// Longitude (degrees)
    #[serde(rename = "lon")]
    pub longitude: f64,

    /// Altitude (meters)
    #[serde(rename = "alt")]
    pub altitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_field_names() {
        let report = TelemetryReport {
            latitude: 1.5,
            longitude: 2.5,
            altitude: 100.0,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["lat"], 1.5);
        assert_eq!(json["lon"], 2.5);
        assert_eq!(json["alt"], 100.0);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
