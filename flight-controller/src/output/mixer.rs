use crate::communication_interfaces::link_channel::StickAxis;
use crate::config::constants::{
    HOVER_THROTTLE, MAX_ASCEND_THROTTLE, MAX_DESCEND_THROTTLE, MAX_MOTORS, TRIM_POT_RANGE,
};
use crate::util::error::AppError;

/// Axis deltas at or below this are treated as zero.
pub const AXIS_CHANGE_EPSILON: f32 = 0.001;

pub type MotorIndices = heapless::Vec<usize, MAX_MOTORS>;

/// Motors that speed up and slow down for a positive axis output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisRoute {
    pub positive: MotorIndices,
    pub negative: MotorIndices,
}

/// Piecewise linear stick response through `min`, `mid` and `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCurve {
    pub min: f32,
    pub mid: f32,
    pub max: f32,
}

impl ControlCurve {
    pub const fn new(min: f32, mid: f32, max: f32) -> Self {
        ControlCurve { min, mid, max }
    }

    /// Maps a stick value in [-1, 1].
    pub fn apply(&self, normalized: f32) -> f32 {
        let value = normalized.clamp(-1.0, 1.0);
        if value < 0.0 {
            self.mid + (self.mid - self.min) * value
        } else {
            self.mid + (self.max - self.mid) * value
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputTarget {
    /// Added straight onto these motors.
    Motors(MotorIndices),
    /// Added to the target of the axis controller at this index.
    AxisOffset(usize),
}

/// A stick axis fed through a curve into motors or a controller offset.
#[derive(Debug, Clone, PartialEq)]
pub struct InputRoute {
    pub stick: StickAxis,
    pub curve: ControlCurve,
    pub target: InputTarget,
}

/// Base throttle around the hover point, as a fraction of full power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleCurve {
    pub hover: f32,
    /// Full travel of the trim pot, centered on its midpoint.
    pub pot_range: f32,
    pub max_descend: f32,
    pub max_ascend: f32,
}

impl Default for ThrottleCurve {
    fn default() -> Self {
        ThrottleCurve {
            hover: HOVER_THROTTLE,
            pot_range: TRIM_POT_RANGE,
            max_descend: MAX_DESCEND_THROTTLE,
            max_ascend: MAX_ASCEND_THROTTLE,
        }
    }
}

impl ThrottleCurve {
    /// `throttle` is the stick in [-1, 1], `trim` the pot in [0, 1].
    pub fn base(&self, throttle: f32, trim: f32) -> f32 {
        let throttle = throttle.clamp(-1.0, 1.0);
        let stick = if throttle < 0.0 {
            throttle * self.max_descend
        } else {
            throttle * self.max_ascend
        };
        self.hover + (trim - 0.5) * self.pot_range + stick
    }
}

/// Accumulates per-motor deltas over one tick and turns them into clamped
/// motor commands.
pub struct MotorMixer {
    trims: heapless::Vec<f32, MAX_MOTORS>,
    deltas: heapless::Vec<f32, MAX_MOTORS>,
    max_value: f32,
}

impl MotorMixer {
    pub fn new(trims: &[f32], max_value: f32) -> Result<Self, AppError> {
        if trims.is_empty() || trims.len() > MAX_MOTORS {
            return Err(AppError::config(format!(
                "mixer needs 1..={} motors, got {}",
                MAX_MOTORS,
                trims.len()
            )));
        }
        if max_value <= 0.0 {
            return Err(AppError::config("mixer max value must be positive"));
        }
        let mut deltas = heapless::Vec::new();
        // Both vectors share the capacity checked above.
        let _ = deltas.resize(trims.len(), 0.0);
        Ok(MotorMixer {
            trims: heapless::Vec::from_slice(trims)
                .map_err(|_| AppError::config("too many motor trims"))?,
            deltas,
            max_value,
        })
    }

    pub fn motor_count(&self) -> usize {
        self.trims.len()
    }

    pub fn begin_tick(&mut self) {
        self.deltas.iter_mut().for_each(|delta| *delta = 0.0);
    }

    pub fn add_motor_power(&mut self, index: usize, amount: f32) {
        match self.deltas.get_mut(index) {
            Some(delta) => *delta += amount,
            None => log::warn!("Ignoring power for unknown motor {}", index),
        }
    }

    pub fn add_axis_change(&mut self, delta: f32, positive: &[usize], negative: &[usize]) {
        if delta.abs() <= AXIS_CHANGE_EPSILON {
            return;
        }
        for &index in positive {
            self.add_motor_power(index, delta);
        }
        for &index in negative {
            self.add_motor_power(index, -(delta - AXIS_CHANGE_EPSILON));
        }
    }

    pub fn finalize(&self, base_throttle: f32) -> heapless::Vec<f32, MAX_MOTORS> {
        self.trims
            .iter()
            .zip(self.deltas.iter())
            .map(|(trim, delta)| {
                let command = (base_throttle + trim + delta) * self.max_value;
                if command.is_nan() {
                    0.0
                } else {
                    command.clamp(0.0, self.max_value)
                }
            })
            .collect()
    }

    pub fn deltas(&self) -> &[f32] {
        &self.deltas
    }
}
