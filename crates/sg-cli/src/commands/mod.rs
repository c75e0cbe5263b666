//! CLI command implementations.

mod simulate;

pub use simulate::{parse_offsets, run_simulation, SimulationConfig, SimulationStep};
