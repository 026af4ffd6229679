use crate::communication_interfaces::link_channel::StickAxis;
use crate::config::constants::*;
use crate::control::pid::{PidGains, RotationAxis, SignalRef};
use crate::control::yaw::YawPolicy;
use crate::output::mixer::{AxisRoute, InputRoute, InputTarget, ThrottleCurve};
use crate::output::vehicle_movement_mappers::quad_x_routes;
use crate::util::error::AppError;
use crate::util::math::vectors::RotationVector3D;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub deadzone: i16,
    pub invert_pitch: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailsafeConfig {
    /// Largest inter-packet gap that still counts as on time.
    pub max_delay_us: u64,
    /// Silence after which the flight is aborted.
    pub abort_threshold_us: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MadgwickConfig {
    /// Gradient step, rad/s.
    pub beta: f32,
    /// Gyro bias integration rate, rad/s.
    pub zeta: f32,
    pub seed_samples: usize,
    pub seed_interval_ms: u32,
    pub angle_process_noise: f32,
    pub angle_measurement_noise: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionProcessorConfig {
    /// Attitude samples used for the finite-difference rate, at least 2.
    pub rate_window: usize,
    pub angle_offset: RotationVector3D,
    pub warmup_reads: u32,
    pub warmup_interval_ms: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorConfig {
    Madgwick(MadgwickConfig),
    MotionProcessor(MotionProcessorConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisConfig {
    pub name: &'static str,
    pub gains: PidGains,
    pub target: SignalRef,
    pub current: SignalRef,
    pub derivative: Option<SignalRef>,
    pub route: AxisRoute,
    pub yaw: Option<YawPolicy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfig {
    pub motor_count: usize,
    pub trims: heapless::Vec<f32, MAX_MOTORS>,
    pub max_value: f32,
    pub throttle: ThrottleCurve,
    pub inputs: heapless::Vec<InputRoute, MAX_INPUT_ROUTES>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorOutputConfig {
    pub min_duty_fraction: f32,
    pub max_duty_fraction: f32,
    pub command_max: f32,
    pub arming_delay_ms: u32,
    pub test_spin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub log_every_n_ticks: u32,
    pub retention: usize,
}

/// Everything the flight core reads once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightConfig {
    pub loop_period_us: u32,
    pub link: LinkConfig,
    pub failsafe: FailsafeConfig,
    pub estimator: EstimatorConfig,
    pub axes: heapless::Vec<AxisConfig, MAX_AXES>,
    pub mixer: MixerConfig,
    pub motors: MotorOutputConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            deadzone: STICK_DEADZONE,
            invert_pitch: INVERT_PITCH_STICK,
        }
    }
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        FailsafeConfig {
            max_delay_us: MAX_RADIO_DELAY_US,
            abort_threshold_us: LINK_ABORT_THRESHOLD_US,
        }
    }
}

impl Default for MadgwickConfig {
    fn default() -> Self {
        let gain = libm::sqrtf(3.0 / 4.0);
        MadgwickConfig {
            beta: gain * GYRO_MEASUREMENT_ERROR_DEG.to_radians(),
            zeta: gain * GYRO_MEASUREMENT_DRIFT_DEG.to_radians(),
            seed_samples: SEED_SAMPLE_COUNT,
            seed_interval_ms: SEED_SAMPLE_INTERVAL_MS,
            angle_process_noise: GYRO_DRIFT_DEG,
            angle_measurement_noise: ACCEL_UNCERTAINTY_DEG,
        }
    }
}

impl Default for MotionProcessorConfig {
    fn default() -> Self {
        MotionProcessorConfig {
            rate_window: DMP_RATE_WINDOW,
            angle_offset: RotationVector3D {
                roll: DMP_ANGLE_OFFSET_DEG[0],
                pitch: DMP_ANGLE_OFFSET_DEG[1],
                yaw: DMP_ANGLE_OFFSET_DEG[2],
            },
            warmup_reads: DMP_WARMUP_READS,
            warmup_interval_ms: DMP_WARMUP_INTERVAL_MS,
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Madgwick(MadgwickConfig::default())
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            motor_count: MOTOR_COUNT,
            trims: heapless::Vec::from_iter(MOTOR_TRIMS),
            max_value: MOTOR_COMMAND_MAX,
            throttle: ThrottleCurve::default(),
            inputs: heapless::Vec::new(),
        }
    }
}

impl Default for MotorOutputConfig {
    fn default() -> Self {
        MotorOutputConfig {
            min_duty_fraction: MIN_MOTOR_DUTY_FRACTION,
            max_duty_fraction: MAX_MOTOR_DUTY_FRACTION,
            command_max: MOTOR_COMMAND_MAX,
            arming_delay_ms: ESC_ARMING_DELAY_MS,
            test_spin: false,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            log_every_n_ticks: LOG_EVERY_N_TICKS,
            retention: LOG_RETENTION,
        }
    }
}

/// Angle mode on roll and pitch, rate hold on yaw, quad-X motor layout.
pub fn default_axes() -> heapless::Vec<AxisConfig, MAX_AXES> {
    let [roll_route, pitch_route, yaw_route] = quad_x_routes();
    let (roll_kp, roll_ki, roll_kd) = ROLL_PID;
    let (pitch_kp, pitch_ki, pitch_kd) = PITCH_PID;

    heapless::Vec::from_iter([
        AxisConfig {
            name: "roll",
            gains: PidGains::new(roll_kp, roll_ki, roll_kd),
            target: SignalRef::stick(StickAxis::Roll, MAX_INCLINATION),
            current: SignalRef::angle(RotationAxis::Roll),
            derivative: Some(SignalRef::rate(RotationAxis::Roll)),
            route: roll_route,
            yaw: None,
        },
        AxisConfig {
            name: "pitch",
            gains: PidGains::new(pitch_kp, pitch_ki, pitch_kd),
            target: SignalRef::stick(StickAxis::Pitch, MAX_INCLINATION),
            current: SignalRef::angle(RotationAxis::Pitch),
            derivative: Some(SignalRef::rate(RotationAxis::Pitch)),
            route: pitch_route,
            yaw: None,
        },
        AxisConfig {
            name: "yaw",
            gains: PidGains::new(0.0, 0.0, YAW_RATE_KD),
            target: SignalRef::constant(0.0),
            current: SignalRef::constant(0.0),
            derivative: Some(SignalRef::rate(RotationAxis::Yaw)),
            route: yaw_route,
            yaw: Some(YawPolicy::new(YAW_STICK_GAIN)),
        },
    ])
}

impl Default for FlightConfig {
    fn default() -> Self {
        FlightConfig {
            loop_period_us: CONTROL_LOOP_PERIOD_US,
            link: LinkConfig::default(),
            failsafe: FailsafeConfig::default(),
            estimator: EstimatorConfig::default(),
            axes: default_axes(),
            mixer: MixerConfig::default(),
            motors: MotorOutputConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl FlightConfig {
    pub fn motor_count(&self) -> usize {
        self.mixer.motor_count
    }

    /// Rejects configurations the flight loop must never see.
    pub fn validate(&self) -> Result<(), AppError> {
        let result = self.check();
        if let Err(error) = &result {
            log::error!("Rejected flight configuration: {}", error);
        }
        result
    }

    fn check(&self) -> Result<(), AppError> {
        if self.loop_period_us == 0 {
            return Err(AppError::config("loop period must be positive"));
        }
        if !(0..i16::from(i8::MAX)).contains(&self.link.deadzone) {
            return Err(AppError::config(format!(
                "stick deadzone {} out of range",
                self.link.deadzone
            )));
        }

        let failsafe = &self.failsafe;
        if failsafe.max_delay_us == 0 {
            return Err(AppError::config("max radio delay must be positive"));
        }
        if failsafe.abort_threshold_us < failsafe.max_delay_us {
            return Err(AppError::config(format!(
                "abort threshold {}us is below the max radio delay {}us",
                failsafe.abort_threshold_us, failsafe.max_delay_us
            )));
        }

        match &self.estimator {
            EstimatorConfig::Madgwick(madgwick) => {
                if !(madgwick.beta >= 0.0 && madgwick.zeta >= 0.0) {
                    return Err(AppError::config("madgwick gains must be non-negative"));
                }
                if madgwick.seed_samples == 0 {
                    return Err(AppError::config("at least one seed sample is required"));
                }
                if !(madgwick.angle_process_noise > 0.0 && madgwick.angle_measurement_noise > 0.0)
                {
                    return Err(AppError::config("angle filter noise must be positive"));
                }
            }
            EstimatorConfig::MotionProcessor(dmp) => {
                if dmp.rate_window < 2 || dmp.rate_window > DMP_MAX_RATE_WINDOW {
                    return Err(AppError::config(format!(
                        "rate window {} must be within 2..={}",
                        dmp.rate_window, DMP_MAX_RATE_WINDOW
                    )));
                }
            }
        }

        let motor_count = self.motor_count();
        if motor_count == 0 || motor_count > MAX_MOTORS {
            return Err(AppError::config(format!(
                "motor count {} must be within 1..={}",
                motor_count, MAX_MOTORS
            )));
        }
        if self.mixer.trims.len() != motor_count {
            return Err(AppError::config(format!(
                "{} motor trims given for {} motors",
                self.mixer.trims.len(),
                motor_count
            )));
        }
        if !(self.mixer.max_value > 0.0) {
            return Err(AppError::config("mixer max value must be positive"));
        }
        if self.motors.command_max != self.mixer.max_value {
            return Err(AppError::config(
                "motor command range differs from the mixer output range",
            ));
        }

        for axis in &self.axes {
            check_motor_indices(axis.name, &axis.route.positive, motor_count)?;
            check_motor_indices(axis.name, &axis.route.negative, motor_count)?;
        }

        for input in &self.mixer.inputs {
            match &input.target {
                InputTarget::Motors(motors) => check_motor_indices("input", motors, motor_count)?,
                InputTarget::AxisOffset(axis) if *axis >= self.axes.len() => {
                    return Err(AppError::config(format!(
                        "input route references unknown axis {}",
                        axis
                    )));
                }
                InputTarget::AxisOffset(_) => {}
            }
        }

        let motors = &self.motors;
        if !(0.0 <= motors.min_duty_fraction
            && motors.min_duty_fraction < motors.max_duty_fraction
            && motors.max_duty_fraction <= 1.0)
        {
            return Err(AppError::config(format!(
                "duty window {}..{} is invalid",
                motors.min_duty_fraction, motors.max_duty_fraction
            )));
        }

        if self.telemetry.log_every_n_ticks == 0 {
            return Err(AppError::config("telemetry divider must be positive"));
        }
        if self.telemetry.retention == 0 {
            return Err(AppError::config("telemetry retention must keep at least one log"));
        }

        Ok(())
    }
}

fn check_motor_indices(owner: &str, motors: &[usize], motor_count: usize) -> Result<(), AppError> {
    match motors.iter().find(|index| **index >= motor_count) {
        Some(index) => Err(AppError::config(format!(
            "{} routes to motor {} but only {} motors exist",
            owner, index, motor_count
        ))),
        None => Ok(()),
    }
}
