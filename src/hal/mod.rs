// src/hal/mod.rs
//! Hardware abstraction for the tracking sensor and telemetry watch

pub mod simulator;
pub mod traits;
pub mod types;

pub use simulator::{SimulatedHand, SimulatedRenderer, SimulatedWatch};
pub use traits::*;
pub use types::*;
