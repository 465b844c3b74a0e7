use serde::{Serialize, Serializer};
use std::fmt;

use crate::errors::ConfigurationError;

/// Identifier of a simulated device. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigurationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigurationError::Empty("device id"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One synthetic telemetry observation.
///
/// Readings are only built by [`crate::generator::ReadingGenerator`], which
/// guarantees a non-empty device id and finite measurements. Serializes to a
/// JSON object with exactly `device_id`, `temperature_c`, `humidity_pct` and
/// `recorded_at_unix`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReading {
    device_id: DeviceId,
    temperature_c: f64,
    humidity_pct: f64,
    recorded_at_unix: f64,
}

impl TelemetryReading {
    pub(crate) fn new(
        device_id: DeviceId,
        temperature_c: f64,
        humidity_pct: f64,
        recorded_at_unix: f64,
    ) -> Self {
        debug_assert!(temperature_c.is_finite() && humidity_pct.is_finite());
        Self {
            device_id,
            temperature_c,
            humidity_pct,
            recorded_at_unix,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    pub fn humidity_pct(&self) -> f64 {
        self.humidity_pct
    }

    pub fn recorded_at_unix(&self) -> f64 {
        self.recorded_at_unix
    }

    /// Compact JSON encoding used as the event body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
