pub mod imu_sensor_traits;
pub mod madgwick;
pub mod motion_processor;

use embedded_hal::delay::DelayNs;

use self::imu_sensor_traits::{ImuSample, InertialSensor, MotionProcessor};
use self::madgwick::MadgwickEstimator;
use self::motion_processor::MotionProcessorEstimator;
use crate::config::store::EstimatorConfig;
use crate::util::error::AppError;
use crate::util::math::vectors::RotationVector3D;

/// Attitude published to the rest of the tick. Degrees and degrees per second.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AttitudeState {
    pub angles: RotationVector3D,
    pub rates: RotationVector3D,
}

pub trait AttitudeEstimator {
    /// Advances the estimate by `dt_s`. A missing sample holds the last state.
    fn update(&mut self, sample: Option<&ImuSample>, dt_s: f32) -> AttitudeState;

    fn state(&self) -> AttitudeState;
}

/// The attitude source the board was built with.
pub enum ImuDevice<'a> {
    Inertial(&'a mut dyn InertialSensor),
    MotionProcessor(Box<dyn MotionProcessor>),
}

/// Initializes the device and returns the estimator selected by `config`.
pub fn start_estimator<D: DelayNs + ?Sized>(
    config: &EstimatorConfig,
    device: ImuDevice<'_>,
    delay: &mut D,
) -> Result<Box<dyn AttitudeEstimator>, AppError> {
    match (config, device) {
        (EstimatorConfig::Madgwick(madgwick), ImuDevice::Inertial(sensor)) => {
            let mut estimator = MadgwickEstimator::new(madgwick);
            estimator.start(sensor, delay)?;
            Ok(Box::new(estimator))
        }
        (EstimatorConfig::MotionProcessor(dmp), ImuDevice::MotionProcessor(processor)) => {
            let mut estimator = MotionProcessorEstimator::new(processor, dmp)?;
            estimator.start(delay)?;
            Ok(Box::new(estimator))
        }
        (EstimatorConfig::Madgwick(_), ImuDevice::MotionProcessor(_)) => Err(AppError::config(
            "Madgwick fusion needs a raw inertial sensor",
        )),
        (EstimatorConfig::MotionProcessor(_), ImuDevice::Inertial(_)) => Err(AppError::config(
            "motion processor estimation needs a fusion capable device",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::imu_sensor_traits::{Accelerometer, Gyroscope};
    use super::*;
    use crate::config::store::{MadgwickConfig, MotionProcessorConfig};
    use crate::util::error::ErrorKind;
    use crate::util::math::vectors::AccelerationVector3D;

    struct LevelImu;

    impl Accelerometer for LevelImu {
        fn get_acceleration_vector(&mut self) -> AccelerationVector3D {
            AccelerationVector3D {
                x: 0.0,
                y: 0.0,
                z: 1.0,
            }
        }
    }

    impl Gyroscope for LevelImu {
        fn get_rotation_rates(&mut self) -> RotationVector3D {
            RotationVector3D::default()
        }
    }

    impl InertialSensor for LevelImu {
        fn initialize(&mut self) -> Result<(), AppError> {
            Ok(())
        }

        fn data_ready(&mut self) -> bool {
            true
        }
    }

    struct SilentProcessor;

    impl MotionProcessor for SilentProcessor {
        fn initialize(&mut self) -> Result<(), AppError> {
            Ok(())
        }

        fn read_orientation(&mut self) -> Option<RotationVector3D> {
            None
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn builds_estimator_matching_device() {
        let mut imu = LevelImu;
        let madgwick = EstimatorConfig::Madgwick(MadgwickConfig::default());
        let mut estimator =
            start_estimator(&madgwick, ImuDevice::Inertial(&mut imu), &mut NoDelay).unwrap();
        let sample = imu.read_sample();
        assert_eq!(estimator.update(sample.as_ref(), 0.005).angles.roll, 0.0);

        let mut config = MotionProcessorConfig::default();
        config.warmup_reads = 3;
        let dmp = EstimatorConfig::MotionProcessor(config);
        let estimator = start_estimator(
            &dmp,
            ImuDevice::MotionProcessor(Box::new(SilentProcessor)),
            &mut NoDelay,
        );
        assert!(estimator.is_ok());
    }

    #[test]
    fn rejects_mismatched_device() {
        let dmp = EstimatorConfig::MotionProcessor(MotionProcessorConfig::default());
        let mut imu = LevelImu;
        let error = start_estimator(&dmp, ImuDevice::Inertial(&mut imu), &mut NoDelay)
            .err()
            .unwrap();
        assert_eq!(error.kind, ErrorKind::Config);
    }
}
