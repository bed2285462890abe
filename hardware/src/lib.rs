//! Hardware drivers for field cage equipment.
//!
//! This crate provides drivers for the instruments on the Helmholtz cage
//! bench. All drivers are cross-platform: the serial protocols go through
//! the `serialport` crate and the network protocols through blocking
//! `std::net` sockets with bounded timeouts.
//!
//! # Drivers
//!
//! - [`mfg`] - MFG-3 three-axis fluxgate magnetometer (serial protocol)
//! - [`mdl`] - MDL datalogger station (72-byte binary records over TCP)
//! - [`coil`] - Helmholtz coil driver amplifier (outbound command frames)

pub mod coil;
pub mod mdl;
pub mod mfg;
