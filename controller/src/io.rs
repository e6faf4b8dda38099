use icebox_common::SensorError;
use tracing::info;

/// One reading per poll cycle. An `Err` means the cycle is skipped.
pub trait TemperatureSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError>;
}

/// Binary relay drive. The reference wiring is active-low, so implementations
/// translate logical ON into a logic-low pin level themselves.
pub trait RelayOutput {
    fn set_output(&mut self, on: bool);
}

/// Hardware integration point: on the ESP32 target a DHT22 provides the
/// readings; host builds sweep a deterministic waveform through the whole
/// hysteresis band instead.
pub struct SimulatedCoolerSensor {
    tick: u64,
}

impl SimulatedCoolerSensor {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl TemperatureSensor for SimulatedCoolerSensor {
    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        self.tick = self.tick.saturating_add(1);
        Ok(4.5 + ((self.tick % 120) as f32 * 0.05))
    }
}

pub struct LoggingRelay;

impl RelayOutput for LoggingRelay {
    fn set_output(&mut self, on: bool) {
        let pin_level = if on { "low" } else { "high" };
        info!("relay {} (pin {pin_level})", if on { "ON" } else { "OFF" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_sensor_sweeps_across_both_thresholds() {
        let mut sensor = SimulatedCoolerSensor::new();

        let mut saw_below_band = false;
        let mut saw_above_band = false;
        for _ in 0..120 {
            let temp = sensor.read_temperature().unwrap();
            assert!(temp.is_finite());
            saw_below_band |= temp < 5.0;
            saw_above_band |= temp > 7.0;
        }

        assert!(saw_below_band);
        assert!(saw_above_band);
    }
}
