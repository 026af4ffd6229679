use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

use super::motor_controller::MotorController;
use crate::config::constants::{
    MAX_MOTORS, TEST_SPIN_COMMAND, TEST_SPIN_DURATION_MS, TEST_SPIN_PAUSE_MS, TEST_SPIN_SETTLE_MS,
};
use crate::config::store::MotorOutputConfig;
use crate::util::error::AppError;

pub struct MotorsStateManager<P: SetDutyCycle> {
    controllers: heapless::Vec<MotorController<P>, MAX_MOTORS>,
    arming_delay_ms: u32,
    test_spin: bool,
}

impl<P: SetDutyCycle> MotorsStateManager<P> {
    pub fn new(
        pwms: impl IntoIterator<Item = P>,
        config: &MotorOutputConfig,
    ) -> Result<Self, AppError> {
        let mut controllers = heapless::Vec::new();
        for pwm in pwms {
            if controllers.push(MotorController::new(pwm, config)).is_err() {
                return Err(AppError::config(format!(
                    "at most {} motor outputs are supported",
                    MAX_MOTORS
                )));
            }
        }
        if controllers.is_empty() {
            return Err(AppError::config("no motor outputs given"));
        }
        Ok(MotorsStateManager {
            controllers,
            arming_delay_ms: config.arming_delay_ms,
            test_spin: config.test_spin,
        })
    }

    pub fn motor_count(&self) -> usize {
        self.controllers.len()
    }

    /// Holds every ESC at zero long enough for it to arm, then spins each
    /// motor in turn when the test spin is enabled.
    pub fn arm<D: DelayNs + ?Sized>(&mut self, delay: &mut D) -> Result<(), AppError> {
        self.write_all(0.0)?;
        delay.delay_ms(self.arming_delay_ms);
        log::info!("Armed {} motors", self.controllers.len());
        if self.test_spin {
            self.test_spin(delay)?;
        }
        Ok(())
    }

    pub fn test_spin<D: DelayNs + ?Sized>(&mut self, delay: &mut D) -> Result<(), AppError> {
        for (index, controller) in self.controllers.iter_mut().enumerate() {
            delay.delay_ms(TEST_SPIN_PAUSE_MS);
            log::info!("Test spin motor {}", index);
            controller.set_motor_speed(TEST_SPIN_COMMAND)?;
            delay.delay_ms(TEST_SPIN_DURATION_MS);
            controller.set_motor_speed(0.0)?;
        }
        delay.delay_ms(TEST_SPIN_SETTLE_MS);
        Ok(())
    }

    /// Writes one command per motor. Every motor is written even if an
    /// earlier one fails, the first error is returned.
    pub fn set_motor_power(&mut self, values: &[f32]) -> Result<(), AppError> {
        if values.len() != self.controllers.len() {
            return Err(AppError::motor(format!(
                "expected {} motor commands, got {}",
                self.controllers.len(),
                values.len()
            )));
        }
        let mut result = Ok(());
        for (controller, value) in self.controllers.iter_mut().zip(values) {
            if let Err(error) = controller.set_motor_speed(*value) {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    pub fn kill_motors(&mut self) {
        if let Err(error) = self.write_all(0.0) {
            log::error!("Failed to stop a motor: {}", error);
        }
        log::info!("Killed motors");
    }

    fn write_all(&mut self, value: f32) -> Result<(), AppError> {
        let mut result = Ok(());
        for controller in self.controllers.iter_mut() {
            if let Err(error) = controller.set_motor_speed(value) {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }
}
