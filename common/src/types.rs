use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }

    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

/// The one error the control core knows about. Recovered locally by skipping
/// the cycle; it never stops the loop.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SensorError {
    #[error("sensor returned an unreadable value")]
    Unreadable,
    #[error("sensor reading {0} degC is outside the plausible range")]
    OutOfRange(f32),
}

/// Read-only view of the controller for the status page and JSON endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    #[serde(rename = "averageTemp")]
    pub average_temp_c: f32,
    pub relay: &'static str,
    #[serde(rename = "relayOn")]
    pub relay_on: bool,
    #[serde(rename = "sinceLastSwitchMs")]
    pub since_last_switch_ms: u64,
    #[serde(rename = "switchOnAbove")]
    pub switch_on_above_c: f32,
    #[serde(rename = "switchOffBelow")]
    pub switch_off_below_c: f32,
    #[serde(rename = "sensorError")]
    pub sensor_error: bool,
    #[serde(rename = "sampleCount")]
    pub sample_count: usize,
    #[serde(rename = "windowFilled")]
    pub window_filled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let snapshot = StatusSnapshot {
            average_temp_c: 5.75,
            relay: RelayState::On.as_str(),
            relay_on: true,
            since_last_switch_ms: 61_000,
            switch_on_above_c: 7.0,
            switch_off_below_c: 5.0,
            sensor_error: false,
            sample_count: 30,
            window_filled: true,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["averageTemp"], 5.75);
        assert_eq!(value["relay"], "ON");
        assert_eq!(value["relayOn"], true);
        assert_eq!(value["sinceLastSwitchMs"], 61_000);
        assert_eq!(value["switchOnAbove"], 7.0);
        assert_eq!(value["switchOffBelow"], 5.0);
        assert_eq!(value["sensorError"], false);
        assert_eq!(value["sampleCount"], 30);
        assert_eq!(value["windowFilled"], true);
    }

    #[test]
    fn sensor_error_messages_are_displayable() {
        assert_eq!(
            SensorError::Unreadable.to_string(),
            "sensor returned an unreadable value"
        );
        assert!(SensorError::OutOfRange(-80.0).to_string().contains("-80"));
    }
}
