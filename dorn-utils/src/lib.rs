//! Utility library for the DORN experiment harness

pub mod ids;
pub mod serde;
