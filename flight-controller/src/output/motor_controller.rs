use embedded_hal::pwm::{Error, SetDutyCycle};

use crate::config::store::MotorOutputConfig;
use crate::util::error::AppError;

/// One ESC channel driven by a PWM output.
///
/// Commands in `[0, command_max]` map linearly onto the duty window
/// `[min_duty_fraction, max_duty_fraction]` of the peripheral's full duty.
pub struct MotorController<P: SetDutyCycle> {
    pwm: P,
    min_duty: u16,
    max_duty: u16,
    command_max: f32,
}

impl<P: SetDutyCycle> MotorController<P> {
    pub fn new(pwm: P, config: &MotorOutputConfig) -> Self {
        let full_duty = f32::from(pwm.max_duty_cycle());
        MotorController {
            min_duty: (full_duty * config.min_duty_fraction) as u16,
            max_duty: (full_duty * config.max_duty_fraction) as u16,
            command_max: config.command_max,
            pwm,
        }
    }

    pub fn duty_for(&self, command: f32) -> u16 {
        let fraction = if command.is_nan() {
            0.0
        } else {
            (command / self.command_max).clamp(0.0, 1.0)
        };
        let span = f32::from(self.max_duty.saturating_sub(self.min_duty));
        self.min_duty + (span * fraction) as u16
    }

    pub fn set_motor_speed(&mut self, command: f32) -> Result<(), AppError> {
        let duty = self.duty_for(command);
        self.pwm
            .set_duty_cycle(duty)
            .map_err(|error| AppError::motor(format!("duty {} rejected: {:?}", duty, error.kind())))
    }
}
