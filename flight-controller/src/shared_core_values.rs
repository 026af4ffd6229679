use crate::communication_interfaces::link_channel::StickInput;
use crate::config::constants::{MAX_AXES, MAX_MOTORS};
use crate::control::failsafe::LinkState;
use crate::control::inertial_measurement::AttitudeState;
use crate::control::yaw::YawMode;

pub const TICK_STAGE_COUNT: usize = 4;

/// Consecutive sections of one tick whose durations are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    Link = 0,
    Estimator = 1,
    Controllers = 2,
    Motors = 3,
}

impl TickStage {
    pub const ALL: [TickStage; TICK_STAGE_COUNT] = [
        TickStage::Link,
        TickStage::Estimator,
        TickStage::Controllers,
        TickStage::Motors,
    ];

    /// Telemetry field name of the stage duration.
    pub const fn field_name(self) -> &'static str {
        match self {
            TickStage::Link => "t_link",
            TickStage::Estimator => "t_estimator",
            TickStage::Controllers => "t_control",
            TickStage::Motors => "t_motors",
        }
    }
}

/// Values produced during one control tick, handed from stage to stage and
/// read by the telemetry recorder at the end.
#[derive(Debug, Default, Clone)]
pub struct TickContext {
    pub now_us: u64,
    /// Seconds since the previous tick, zero on the first one.
    pub dt_s: f32,
    pub tick: u64,
    pub stick: StickInput,
    pub attitude: AttitudeState,
    pub link: LinkState,
    /// PID output per configured axis, in configuration order.
    pub axis_outputs: heapless::Vec<f32, MAX_AXES>,
    pub base_throttle: f32,
    /// Clamped commands in `[0, max_value]` as written to the motors.
    pub motor_commands: heapless::Vec<f32, MAX_MOTORS>,
    pub yaw_mode: Option<YawMode>,
    /// Microseconds spent per [`TickStage`], zero when the tick is not timed.
    pub stage_us: [u16; TICK_STAGE_COUNT],
}
