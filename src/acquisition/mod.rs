pub mod parser;
pub mod service;
pub mod source;

pub use parser::{
    exponential_smoothing, fill_missing, filter_valid, in_range, is_plausible, parse_registers,
};
pub use service::{AcquisitionService, AcquisitionSettings, RunState};
pub use source::{RegisterSource, ReplaySource, SimulatedSource, SimulationConfig};

/// One sensor's measurement for a tick; `None` when the sensor reported the
/// error sentinel or was dropped upstream.
pub type Reading = Option<f64>;
