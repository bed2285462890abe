//! Field cage control loop orchestration.
//!
//! Wires the instrument drivers from the `hardware` crate into the
//! per-axis estimation and control primitives from the `control` crate:
//! decoded measurements feed three Kalman filters, three independent
//! control ticks run the PID loops, and a transmit tick seals the coil
//! command frame and hands it to the outbound channel.

pub mod config;
pub mod controller;

pub use config::{CageConfig, ConfigError, SensorSource};
pub use controller::{CageController, FieldUpdate};
