use crate::{
    config::{ControlConfig, SAMPLE_CAPACITY},
    samples::SampleWindow,
    types::{RelayState, StatusSnapshot},
};

/// Rolling-average hysteresis controller for the cooler relay.
///
/// The engine owns the decision state; actually driving the pin is the
/// caller's job, so every timestamp comes in as a parameter and the relay
/// polarity (ON means logic-low) stays in the output collaborator.
#[derive(Debug, Clone)]
pub struct CoolerEngine {
    pub config: ControlConfig,
    window: SampleWindow<SAMPLE_CAPACITY>,
    relay: RelayState,
    first_evaluation: bool,
    average_temp_c: f32,
    last_switched_ms: u64,
    last_read_failed: bool,
}

impl CoolerEngine {
    pub fn new(mut config: ControlConfig, now_ms: u64) -> Self {
        config.sanitize();
        Self {
            config,
            window: SampleWindow::new(),
            relay: RelayState::Off,
            first_evaluation: true,
            average_temp_c: 0.0,
            last_switched_ms: now_ms,
            last_read_failed: false,
        }
    }

    pub fn relay_state(&self) -> RelayState {
        self.relay
    }

    pub fn average_temp_c(&self) -> f32 {
        self.average_temp_c
    }

    pub fn last_read_failed(&self) -> bool {
        self.last_read_failed
    }

    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    pub fn since_last_switch_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_switched_ms)
    }

    /// Feeds one valid reading through the window and the hysteresis rule.
    /// Returns the relay state to assert when a decision branch fired.
    pub fn record_sample(&mut self, temp_c: f32, now_ms: u64) -> Option<RelayState> {
        self.last_read_failed = false;
        self.window.push(temp_c);

        let Some(average) = self.window.average() else {
            return None;
        };
        self.average_temp_c = average;

        self.evaluate(average, now_ms)
    }

    /// A failed read skips the whole cycle: window, average, relay state, and
    /// switch timestamp are left exactly as they were.
    pub fn record_read_failure(&mut self) {
        self.last_read_failed = true;
    }

    pub fn status(&self, now_ms: u64) -> StatusSnapshot {
        StatusSnapshot {
            average_temp_c: self.average_temp_c,
            relay: self.relay.as_str(),
            relay_on: self.relay.is_on(),
            since_last_switch_ms: self.since_last_switch_ms(now_ms),
            switch_on_above_c: self.config.switch_on_above_c(),
            switch_off_below_c: self.config.switch_off_below_c(),
            sensor_error: self.last_read_failed,
            sample_count: self.window.len(),
            window_filled: self.window.is_filled(),
        }
    }

    // Asymmetric-guarded hysteresis, first match wins. The band
    // [desired - precision, desired + precision] is the dead zone, both
    // boundaries exclusive. `first_evaluation` relaxes the state guard of
    // either branch so cold start can establish the correct state in one
    // cycle; a single average cannot satisfy both branches at once.
    fn evaluate(&mut self, average_temp_c: f32, now_ms: u64) -> Option<RelayState> {
        let first = self.first_evaluation;
        self.first_evaluation = false;

        let decided = if (first || self.relay == RelayState::Off)
            && average_temp_c > self.config.switch_on_above_c()
        {
            Some(RelayState::On)
        } else if (first || self.relay == RelayState::On)
            && average_temp_c < self.config.switch_off_below_c()
        {
            Some(RelayState::Off)
        } else {
            None
        };

        if let Some(next) = decided {
            self.relay = next;
            self.last_switched_ms = now_ms;
        }

        decided
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> CoolerEngine {
        CoolerEngine::new(ControlConfig::default(), 0)
    }

    #[test]
    fn warm_box_switches_relay_on() {
        let mut engine = engine();

        let mut switched = Vec::new();
        for i in 0..30u64 {
            if let Some(state) = engine.record_sample(10.0, i * 2_000) {
                switched.push((i, state));
            }
        }

        // The first-evaluation override fires on the very first sample.
        assert_eq!(switched, vec![(0, RelayState::On)]);
        assert_eq!(engine.relay_state(), RelayState::On);
        assert!((engine.average_temp_c() - 10.0).abs() < 1e-4);
        assert!(engine.status(60_000).window_filled);
    }

    #[test]
    fn cooled_box_switches_relay_off_exactly_once() {
        let mut engine = engine();
        for i in 0..30u64 {
            engine.record_sample(10.0, i * 2_000);
        }
        assert_eq!(engine.relay_state(), RelayState::On);

        let mut switched = Vec::new();
        for i in 30..60u64 {
            if let Some(state) = engine.record_sample(4.0, i * 2_000) {
                switched.push(state);
            }
        }

        assert_eq!(switched, vec![RelayState::Off]);
        assert_eq!(engine.relay_state(), RelayState::Off);
        assert!((engine.average_temp_c() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn lower_boundary_is_exclusive() {
        // Average exactly at desired - precision (5.0) must not switch off.
        let mut engine = engine();
        engine.relay = RelayState::On;
        engine.first_evaluation = false;

        assert_eq!(engine.evaluate(5.0, 1_000), None);
        assert_eq!(engine.relay_state(), RelayState::On);
    }

    #[test]
    fn upper_boundary_is_exclusive() {
        // 7.0 > 7.0 is false, so an average exactly on the bound stays OFF.
        let mut engine = engine();
        engine.first_evaluation = false;

        assert_eq!(engine.evaluate(7.0, 1_000), None);
        assert_eq!(engine.relay_state(), RelayState::Off);
    }

    #[test]
    fn dead_band_never_chatters() {
        let mut engine = engine();
        engine.relay = RelayState::On;
        engine.first_evaluation = false;

        for average in [5.0, 5.5, 6.0, 6.5, 6.9, 7.0] {
            assert_eq!(engine.evaluate(average, 1_000), None);
            assert_eq!(engine.relay_state(), RelayState::On);
        }

        engine.relay = RelayState::Off;
        for average in [5.0, 5.5, 6.0, 6.5, 6.9, 7.0] {
            assert_eq!(engine.evaluate(average, 1_000), None);
            assert_eq!(engine.relay_state(), RelayState::Off);
        }
    }

    #[test]
    fn first_evaluation_establishes_off_from_off() {
        let mut engine = engine();

        // Below the band on a cold start: the OFF branch fires so the caller
        // re-asserts the pin, even though the logical state was already OFF.
        assert_eq!(engine.evaluate(4.0, 1_000), Some(RelayState::Off));
        assert_eq!(engine.relay_state(), RelayState::Off);

        // Without the override the OFF branch is gated on being ON.
        assert_eq!(engine.evaluate(4.0, 2_000), None);
    }

    #[test]
    fn first_evaluation_overrides_preset_on_state() {
        let mut engine = engine();
        engine.relay = RelayState::On;

        assert_eq!(engine.evaluate(4.0, 1_000), Some(RelayState::Off));
        assert_eq!(engine.evaluate(4.0, 2_000), None);
        assert_eq!(engine.relay_state(), RelayState::Off);
    }

    #[test]
    fn first_evaluation_clears_even_inside_the_band() {
        let mut engine = engine();

        assert_eq!(engine.evaluate(6.0, 1_000), None);
        assert!(!engine.first_evaluation);

        // Later cycles follow the plain state guards.
        assert_eq!(engine.evaluate(7.5, 2_000), Some(RelayState::On));
    }

    #[test]
    fn failed_read_preserves_state_and_raises_flag() {
        let mut engine = engine();
        for i in 0..30u64 {
            engine.record_sample(10.0, i * 2_000);
        }

        let before = engine.status(60_000);
        assert!(!before.sensor_error);

        engine.record_read_failure();
        let after = engine.status(60_000);

        assert!(after.sensor_error);
        assert_eq!(after.average_temp_c, before.average_temp_c);
        assert_eq!(after.relay, before.relay);
        assert_eq!(after.since_last_switch_ms, before.since_last_switch_ms);
        assert_eq!(after.sample_count, before.sample_count);

        // The next valid reading clears the flag again.
        engine.record_sample(10.0, 62_000);
        assert!(!engine.last_read_failed());
    }

    #[test]
    fn average_is_partial_before_the_window_fills() {
        let mut engine = engine();
        engine.record_sample(3.0, 0);
        engine.record_sample(4.0, 2_000);
        engine.record_sample(5.0, 4_000);

        assert_eq!(engine.sample_count(), 3);
        assert!((engine.average_temp_c() - 4.0).abs() < 1e-6);
        assert!(!engine.status(6_000).window_filled);
    }

    #[test]
    fn switch_timestamp_tracks_the_latest_transition() {
        let mut engine = engine();

        engine.record_sample(10.0, 2_000);
        assert_eq!(engine.since_last_switch_ms(10_000), 8_000);

        // Already ON and still warm, no transition: the timestamp stands still.
        engine.record_sample(6.0, 12_000);
        assert_eq!(engine.since_last_switch_ms(20_000), 18_000);
    }
}
