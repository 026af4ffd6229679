pub mod mixer;
pub mod motor_controller;
pub mod motors_state_manager;
pub mod vehicle_movement_mappers;
