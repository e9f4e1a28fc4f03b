//! Linksim core library
//!
//! End-to-end simulation of a high-speed serial link: symbol generation,
//! lossy-channel modeling, transmit pre-emphasis, continuous-time linear
//! equalization, a pluggable DFE/CDR collaborator, and decomposition of the
//! resulting timing jitter into ISI, DCD, periodic, and random components
//! with extrapolated bathtub curves and eye-diagram density maps.
//!
//! The pipeline is single-threaded, straight-line data flow: one call to
//! [`run_simulation`] consumes a [`config::SimulationConfig`] and returns an
//! immutable [`pipeline::SimulationResult`]. No state persists between runs.

pub mod channel;
pub mod config;
pub mod ctle;
pub mod dfe;
pub mod diagnostics;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod signal_processing;
pub mod sink;
pub mod symbols;
pub mod transmitter;
pub mod utils;

// Re-export the canonical entry points.
pub use config::{ModulationType, SimulationConfig, TimeBase};
pub use errors::{ConfigError, DspError, LinkError, Result};
pub use pipeline::{run_simulation, run_simulation_with, SimulationResult};
pub use sink::{MemoryPlotSink, PlotSink};
