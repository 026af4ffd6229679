use crate::util::error::AppError;
use crate::util::math::vectors::{AccelerationVector3D, RotationVector3D};

/// One accelerometer + gyroscope reading.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ImuSample {
    /// Units of g.
    pub acceleration: AccelerationVector3D,
    /// Degrees per second.
    pub rotation_rate: RotationVector3D,
}

pub trait Accelerometer {
    fn get_acceleration_vector(&mut self) -> AccelerationVector3D;
}

pub trait Gyroscope {
    fn get_rotation_rates(&mut self) -> RotationVector3D;
}

/// Raw six-axis sensor fused on the flight controller.
pub trait InertialSensor: Accelerometer + Gyroscope {
    /// Identity check and configuration, run once before the loop.
    fn initialize(&mut self) -> Result<(), AppError>;

    /// Whether a new sample is latched in the device.
    fn data_ready(&mut self) -> bool;

    fn read_sample(&mut self) -> Option<ImuSample> {
        if !self.data_ready() {
            return None;
        }
        Some(ImuSample {
            acceleration: self.get_acceleration_vector(),
            rotation_rate: self.get_rotation_rates(),
        })
    }
}

/// Sensor with an on-chip fusion engine.
pub trait MotionProcessor {
    fn initialize(&mut self) -> Result<(), AppError>;

    /// Roll, pitch and yaw in degrees when a fused packet is ready. Must not
    /// block.
    fn read_orientation(&mut self) -> Option<RotationVector3D>;
}
