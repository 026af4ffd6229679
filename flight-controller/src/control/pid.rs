use super::integrator::Integrator;
use crate::communication_interfaces::link_channel::StickAxis;
use crate::shared_core_values::TickContext;
use crate::util::math::vectors::RotationVector3D;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        PidGains { kp, ki, kd }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotationAxis {
    Roll,
    Pitch,
    Yaw,
}

/// Where a controller input is read from each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalSource {
    Constant(f32),
    /// Stick axis scaled to [-1, 1].
    Stick(StickAxis),
    /// Trim pot in [0, 1].
    Trim,
    /// Estimated attitude, degrees.
    Angle(RotationAxis),
    /// Estimated angular rate, degrees per second.
    Rate(RotationAxis),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRef {
    pub source: SignalSource,
    pub scale: f32,
}

impl SignalRef {
    pub const fn constant(value: f32) -> Self {
        SignalRef {
            source: SignalSource::Constant(value),
            scale: 1.0,
        }
    }

    pub const fn stick(axis: StickAxis, scale: f32) -> Self {
        SignalRef {
            source: SignalSource::Stick(axis),
            scale,
        }
    }

    pub const fn angle(axis: RotationAxis) -> Self {
        SignalRef {
            source: SignalSource::Angle(axis),
            scale: 1.0,
        }
    }

    pub const fn rate(axis: RotationAxis) -> Self {
        SignalRef {
            source: SignalSource::Rate(axis),
            scale: 1.0,
        }
    }

    pub fn resolve(&self, context: &TickContext) -> f32 {
        let value = match self.source {
            SignalSource::Constant(value) => value,
            SignalSource::Stick(axis) => context.stick.normalized(axis),
            SignalSource::Trim => context.stick.trim,
            SignalSource::Angle(axis) => component(&context.attitude.angles, axis),
            SignalSource::Rate(axis) => component(&context.attitude.rates, axis),
        };
        value * self.scale
    }
}

fn component(vector: &RotationVector3D, axis: RotationAxis) -> f32 {
    match axis {
        RotationAxis::Roll => vector.roll,
        RotationAxis::Pitch => vector.pitch,
        RotationAxis::Yaw => vector.yaw,
    }
}

/// PID law for one controlled axis.
///
/// The derivative term either uses an externally measured rate or the change
/// of the error between ticks. Both are applied as `-Kd * derivative`.
pub struct AxisController {
    gains: PidGains,
    target: SignalRef,
    current: SignalRef,
    derivative: Option<SignalRef>,
    error_integrator: Integrator,
    previous_error: f32,
    current_error: f32,
    offset: f32,
}

impl AxisController {
    pub fn configure(
        gains: PidGains,
        target: SignalRef,
        current: SignalRef,
        derivative: Option<SignalRef>,
    ) -> Self {
        AxisController {
            gains,
            target,
            current,
            derivative,
            error_integrator: Integrator::new(),
            previous_error: 0.0_f32,
            current_error: 0.0_f32,
            offset: 0.0_f32,
        }
    }

    /// Biases the target of the next compute only.
    pub fn add_offset(&mut self, value: f32) {
        self.offset += value;
    }

    pub fn compute(&mut self, context: &TickContext) -> f32 {
        let target = self.target.resolve(context);
        let current = self.current.resolve(context);
        let derivative = self.derivative.map(|signal| signal.resolve(context));
        self.update(target, current, derivative, context.dt_s)
    }

    pub fn update(
        &mut self,
        target: f32,
        current: f32,
        derivative: Option<f32>,
        iteration_length: f32,
    ) -> f32 {
        let error = target + self.offset - current;
        self.offset = 0.0_f32;
        self.current_error = error;

        let proportional_output = error * self.gains.kp;

        let accumulated_error = if iteration_length > 0.0 {
            self.error_integrator.add_new_value(error, iteration_length)
        } else {
            self.error_integrator.get_current_value()
        };
        let integral_output = accumulated_error * self.gains.ki;

        let change_rate = match derivative {
            Some(rate) => rate,
            None if iteration_length > 0.0 => (error - self.previous_error) / iteration_length,
            None => 0.0_f32,
        };
        let derivative_output = -self.gains.kd * change_rate;
        self.previous_error = error;

        proportional_output + integral_output + derivative_output
    }

    /// Clears the integral and error history. Only called on abort or
    /// reinitialization.
    pub fn reset(&mut self) {
        self.error_integrator.reset();
        self.previous_error = 0.0_f32;
        self.current_error = 0.0_f32;
        self.offset = 0.0_f32;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f32 {
        self.error_integrator.get_current_value()
    }

    pub fn current_error(&self) -> f32 {
        self.current_error
    }

    pub fn previous_error(&self) -> f32 {
        self.previous_error
    }

    pub fn pending_offset(&self) -> f32 {
        self.offset
    }
}
