// Control loop
pub const CONTROL_LOOP_PERIOD_US: u32 = 5_000;

// Capacity of the runtime buffers
pub const MAX_MOTORS: usize = 8;
pub const MAX_AXES: usize = 6;
pub const MAX_INPUT_ROUTES: usize = 8;

// Radio link
pub const STICK_DEADZONE: i16 = 5;
pub const INVERT_PITCH_STICK: bool = true;
pub const MAX_RADIO_DELAY_US: u64 = 1_000_000 / 50;
pub const LINK_ABORT_THRESHOLD_US: u64 = 900_000;

// Madgwick fusion
pub const GYRO_MEASUREMENT_ERROR_DEG: f32 = 40.0_f32;
pub const GYRO_MEASUREMENT_DRIFT_DEG: f32 = 0.2_f32;
pub const SEED_SAMPLE_COUNT: usize = 10;
pub const SEED_SAMPLE_INTERVAL_MS: u32 = 1;

// For kalmal filters purposes
pub const GYRO_DRIFT_DEG: f32 = 3.0_f32;
pub const ACCEL_UNCERTAINTY_DEG: f32 = 3.0_f32;

// Motion processor fusion
pub const DMP_RATE_WINDOW: usize = 20;
pub const DMP_MAX_RATE_WINDOW: usize = 50;
pub const DMP_ANGLE_OFFSET_DEG: [f32; 3] = [8.0, 1.1, 0.0]; // roll, pitch, yaw
pub const DMP_WARMUP_READS: u32 = 1_000;
pub const DMP_WARMUP_INTERVAL_MS: u32 = 4;

//Drone limits
pub const MAX_INCLINATION: f32 = 30.0_f32;
pub const ROLL_PID: (f32, f32, f32) = (0.006, 0.002, 0.001);
pub const PITCH_PID: (f32, f32, f32) = (0.006, 0.002, 0.001);
pub const YAW_RATE_KD: f32 = 0.002;
pub const YAW_STICK_GAIN: f32 = 0.15;

// Mixer
pub const MOTOR_COUNT: usize = 4;
pub const MOTOR_TRIMS: [f32; MOTOR_COUNT] = [0.0; MOTOR_COUNT];
pub const MOTOR_COMMAND_MAX: f32 = 1000.0_f32;
pub const HOVER_THROTTLE: f32 = 0.45_f32;
pub const TRIM_POT_RANGE: f32 = 0.1_f32;
pub const MAX_DESCEND_THROTTLE: f32 = 0.45_f32;
pub const MAX_ASCEND_THROTTLE: f32 = 0.3_f32;

//Motors Controller, OneShot125 occupies the upper half of the duty range
pub const MIN_MOTOR_DUTY_FRACTION: f32 = 0.5_f32;
pub const MAX_MOTOR_DUTY_FRACTION: f32 = 1.0_f32;
pub const ESC_ARMING_DELAY_MS: u32 = 2_500;
pub const TEST_SPIN_COMMAND: f32 = 55.0_f32;
pub const TEST_SPIN_DURATION_MS: u32 = 300;
pub const TEST_SPIN_PAUSE_MS: u32 = 100;
pub const TEST_SPIN_SETTLE_MS: u32 = 250;

// Telemetry
pub const LOG_EVERY_N_TICKS: u32 = 4;
pub const LOG_RETENTION: usize = 8;
