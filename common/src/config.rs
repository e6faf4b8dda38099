use serde::{Deserialize, Serialize};

/// One sample every 2 s makes the full window span a minute.
pub const SAMPLE_CAPACITY: usize = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    pub desired_temp_c: f32,
    pub precision_temp_c: f32,
    pub poll_interval_ms: u64,
    pub min_valid_temp_c: f32,
    pub max_valid_temp_c: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            desired_temp_c: 6.0,
            precision_temp_c: 1.0,
            poll_interval_ms: 2_000,
            min_valid_temp_c: -40.0,
            max_valid_temp_c: 80.0,
        }
    }
}

impl ControlConfig {
    pub fn sanitize(&mut self) {
        self.desired_temp_c = self.desired_temp_c.clamp(-20.0, 25.0);
        // A non-positive dead band makes both hysteresis branches contradictory.
        self.precision_temp_c = self.precision_temp_c.clamp(0.1, 10.0);
        self.poll_interval_ms = self.poll_interval_ms.clamp(500, 60_000);

        if self.min_valid_temp_c >= self.max_valid_temp_c {
            self.min_valid_temp_c = -40.0;
            self.max_valid_temp_c = 80.0;
        }
    }

    /// Whether a raw reading is usable at all. Anything else is treated as a
    /// failed read and the cycle is skipped.
    pub fn is_plausible(&self, temp_c: f32) -> bool {
        temp_c.is_finite() && (self.min_valid_temp_c..=self.max_valid_temp_c).contains(&temp_c)
    }

    pub fn switch_on_above_c(&self) -> f32 {
        self.desired_temp_c + self.precision_temp_c
    }

    pub fn switch_off_below_c(&self) -> f32 {
        self.desired_temp_c - self.precision_temp_c
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub ap_ssid: String,
    pub ap_pass: String,
    pub http_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ap_ssid: "icebox".to_string(),
            ap_pass: "keepitcool".to_string(),
            http_port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub control: ControlConfig,
    pub network: NetworkConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_restores_a_usable_dead_band() {
        let mut config = ControlConfig {
            precision_temp_c: 0.0,
            ..ControlConfig::default()
        };
        config.sanitize();
        assert!(config.precision_temp_c > 0.0);
    }

    #[test]
    fn plausibility_rejects_nan_and_out_of_range() {
        let config = ControlConfig::default();
        assert!(config.is_plausible(6.0));
        assert!(config.is_plausible(-40.0));
        assert!(!config.is_plausible(f32::NAN));
        assert!(!config.is_plausible(f32::INFINITY));
        assert!(!config.is_plausible(-80.0));
        assert!(!config.is_plausible(120.0));
    }
}
