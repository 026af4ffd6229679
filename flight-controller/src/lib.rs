//! Real-time core of the flight controller: attitude estimation, the PID
//! bank, motor mixing, link failsafe and flight data recording.
//!
//! Board support (sensor drivers, radio receiver, PWM timers, logger
//! backend) lives outside this crate and plugs in through the traits in
//! [`communication_interfaces`], [`control::inertial_measurement`] and
//! `embedded_hal`.

pub mod communication_interfaces;
pub mod config;
pub mod control;
pub mod output;
pub mod shared_core_values;
pub mod telemetry;
pub mod util;

#[cfg(test)]
mod test_utils;
