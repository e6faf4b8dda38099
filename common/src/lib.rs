pub mod config;
pub mod engine;
pub mod samples;
pub mod types;

pub use config::{ControlConfig, NetworkConfig, RuntimeConfig, SAMPLE_CAPACITY};
pub use engine::CoolerEngine;
pub use samples::SampleWindow;
pub use types::{RelayState, SensorError, StatusSnapshot};
