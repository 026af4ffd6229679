pub mod control_loops;
pub mod failsafe;
pub mod inertial_measurement;
pub mod integrator;
pub mod kalman_filter;
pub mod pid;
pub mod yaw;
