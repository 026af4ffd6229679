use crate::communication_interfaces::link_channel::{StickAxis, StickInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YawMode {
    /// Stick centered, hold heading by damping the yaw rate.
    RateHold,
    /// Stick deflected, command yaw directly.
    StickControl,
}

impl YawMode {
    /// Re-evaluated every tick, keyed only on the raw yaw axis being zero.
    pub fn select(stick: &StickInput) -> Self {
        if stick.axis(StickAxis::Yaw) == 0 {
            YawMode::RateHold
        } else {
            YawMode::StickControl
        }
    }
}

/// Switches the yaw axis between rate stabilization and direct stick control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YawPolicy {
    pub stick_gain: f32,
}

impl YawPolicy {
    pub const fn new(stick_gain: f32) -> Self {
        YawPolicy { stick_gain }
    }

    pub fn apply(&self, stick: &StickInput, stabilized_output: f32) -> (YawMode, f32) {
        let mode = YawMode::select(stick);
        let output = match mode {
            YawMode::RateHold => stabilized_output,
            YawMode::StickControl => stick.normalized(StickAxis::Yaw) * self.stick_gain,
        };
        (mode, output)
    }
}
