//! Core trait shared by the CPU, bus, and device crates.

mod bus;

pub use bus::Bus;
