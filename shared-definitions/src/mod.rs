//! Definitions shared between the flight controller and anything talking to it:
//! the radio control packet and the telemetry log format.

pub mod controller;
pub mod telemetry;
