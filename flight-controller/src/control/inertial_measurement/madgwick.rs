use embedded_hal::delay::DelayNs;
use libm::sqrtf;

use super::imu_sensor_traits::{ImuSample, InertialSensor};
use super::{AttitudeEstimator, AttitudeState};
use crate::config::store::MadgwickConfig;
use crate::control::kalman_filter::KalmanFilter;
use crate::util::error::AppError;
use crate::util::math::vectors::{AccelerationVector3D, Quaternion, RotationVector3D};

/// Madgwick gradient-descent fusion with on-line gyro bias estimation.
///
/// Roll and pitch are smoothed afterwards by a one dimensional Kalman filter
/// each. Yaw is left as integrated since gravity does not observe it.
pub struct MadgwickEstimator {
    quaternion: Quaternion,
    /// rad/s
    gyro_bias: [f32; 3],
    beta: f32,
    zeta: f32,
    roll_filter: KalmanFilter,
    pitch_filter: KalmanFilter,
    seed_samples: usize,
    seed_interval_ms: u32,
    state: AttitudeState,
}

impl MadgwickEstimator {
    pub fn new(config: &MadgwickConfig) -> Self {
        MadgwickEstimator {
            quaternion: Quaternion::IDENTITY,
            gyro_bias: [0.0; 3],
            beta: config.beta,
            zeta: config.zeta,
            roll_filter: KalmanFilter::new(
                config.angle_process_noise,
                config.angle_measurement_noise,
            ),
            pitch_filter: KalmanFilter::new(
                config.angle_process_noise,
                config.angle_measurement_noise,
            ),
            seed_samples: config.seed_samples,
            seed_interval_ms: config.seed_interval_ms,
            state: AttitudeState::default(),
        }
    }

    /// Initializes the sensor and seeds the attitude from a short burst of
    /// accelerometer readings.
    pub fn start<S, D>(&mut self, sensor: &mut S, delay: &mut D) -> Result<(), AppError>
    where
        S: InertialSensor + ?Sized,
        D: DelayNs + ?Sized,
    {
        sensor.initialize()?;

        let mut readings = Vec::with_capacity(self.seed_samples);
        for _ in 0..self.seed_samples {
            delay.delay_ms(self.seed_interval_ms);
            readings.push(sensor.get_acceleration_vector());
        }
        self.seed(&readings)
    }

    /// Sets roll and pitch from the average gravity angle of `readings`.
    pub fn seed(&mut self, readings: &[AccelerationVector3D]) -> Result<(), AppError> {
        let mut roll_sum = 0.0_f32;
        let mut pitch_sum = 0.0_f32;
        let mut used = 0_usize;
        for reading in readings.iter().filter(|reading| reading.normalized().is_some()) {
            let angles = reading.calculate_orientation_angles();
            roll_sum += angles.roll;
            pitch_sum += angles.pitch;
            used += 1;
        }
        if used == 0 {
            return Err(AppError::sensor(
                "no usable accelerometer reading to seed the attitude",
            ));
        }

        let angles = RotationVector3D {
            roll: roll_sum / used as f32,
            pitch: pitch_sum / used as f32,
            yaw: 0.0,
        };
        self.quaternion = Quaternion::from_euler_degrees(angles);
        self.roll_filter.seed(angles.roll);
        self.pitch_filter.seed(angles.pitch);
        self.gyro_bias = [0.0; 3];
        self.state = AttitudeState {
            angles,
            rates: RotationVector3D::default(),
        };
        log::info!(
            "Seeded attitude at roll {:.2} pitch {:.2} from {} samples",
            angles.roll,
            angles.pitch,
            used
        );
        Ok(())
    }

    pub fn quaternion(&self) -> Quaternion {
        self.quaternion
    }

    /// Current gyro bias estimate in degrees per second.
    pub fn gyro_bias(&self) -> RotationVector3D {
        RotationVector3D {
            roll: self.gyro_bias[0].to_degrees(),
            pitch: self.gyro_bias[1].to_degrees(),
            yaw: self.gyro_bias[2].to_degrees(),
        }
    }

    fn fuse(&mut self, accel: AccelerationVector3D, gyro: [f32; 3], dt_s: f32) {
        let Quaternion {
            w: q1,
            x: q2,
            y: q3,
            z: q4,
        } = self.quaternion;
        let (ax, ay, az) = (accel.x, accel.y, accel.z);

        let half_q1 = 0.5 * q1;
        let half_q2 = 0.5 * q2;
        let half_q3 = 0.5 * q3;
        let half_q4 = 0.5 * q4;
        let two_q1 = 2.0 * q1;
        let two_q2 = 2.0 * q2;
        let two_q3 = 2.0 * q3;
        let two_q4 = 2.0 * q4;

        // Predicted minus measured gravity direction.
        let f1 = two_q2 * q4 - two_q1 * q3 - ax;
        let f2 = two_q1 * q2 + two_q3 * q4 - ay;
        let f3 = 1.0 - two_q2 * q2 - two_q3 * q3 - az;

        let j_11_or_24 = two_q3;
        let j_12_or_23 = two_q4;
        let j_13_or_22 = two_q1;
        let j_14_or_21 = two_q2;
        let j_32 = 2.0 * j_14_or_21;
        let j_33 = 2.0 * j_11_or_24;

        let mut gradient = [
            j_14_or_21 * f2 - j_11_or_24 * f1,
            j_12_or_23 * f1 + j_13_or_22 * f2 - j_32 * f3,
            j_12_or_23 * f2 - j_33 * f3 - j_13_or_22 * f1,
            j_14_or_21 * f1 + j_11_or_24 * f2,
        ];
        let norm = sqrtf(gradient.iter().map(|value| value * value).sum());
        if norm > 0.0 && norm.is_finite() {
            gradient.iter_mut().for_each(|value| *value /= norm);
        } else {
            gradient = [0.0; 4];
        }
        let [hat_1, hat_2, hat_3, hat_4] = gradient;

        let gyro_error = [
            two_q1 * hat_2 - two_q2 * hat_1 - two_q3 * hat_4 + two_q4 * hat_3,
            two_q1 * hat_3 + two_q2 * hat_4 - two_q3 * hat_1 - two_q4 * hat_2,
            two_q1 * hat_4 - two_q2 * hat_3 + two_q3 * hat_2 - two_q4 * hat_1,
        ];
        for (bias, error) in self.gyro_bias.iter_mut().zip(gyro_error) {
            *bias += error * dt_s * self.zeta;
        }
        let gx = gyro[0] - self.gyro_bias[0];
        let gy = gyro[1] - self.gyro_bias[1];
        let gz = gyro[2] - self.gyro_bias[2];

        let q_dot_1 = -half_q2 * gx - half_q3 * gy - half_q4 * gz;
        let q_dot_2 = half_q1 * gx + half_q3 * gz - half_q4 * gy;
        let q_dot_3 = half_q1 * gy - half_q2 * gz + half_q4 * gx;
        let q_dot_4 = half_q1 * gz + half_q2 * gy - half_q3 * gx;

        self.quaternion = Quaternion {
            w: q1 + (q_dot_1 - self.beta * hat_1) * dt_s,
            x: q2 + (q_dot_2 - self.beta * hat_2) * dt_s,
            y: q3 + (q_dot_3 - self.beta * hat_3) * dt_s,
            z: q4 + (q_dot_4 - self.beta * hat_4) * dt_s,
        }
        .normalized();
    }
}

impl AttitudeEstimator for MadgwickEstimator {
    fn update(&mut self, sample: Option<&ImuSample>, dt_s: f32) -> AttitudeState {
        let Some(sample) = sample else {
            return self.state;
        };
        let gyro = sample.rotation_rate.to_radians();
        let gyro = [gyro.roll, gyro.pitch, gyro.yaw];

        // A zero-length acceleration carries no gravity direction, skip fusion.
        let fused = match sample.acceleration.normalized() {
            Some(accel) if dt_s > 0.0 => {
                self.fuse(accel, gyro, dt_s);
                true
            }
            _ => false,
        };

        let rates = RotationVector3D {
            roll: (gyro[0] - self.gyro_bias[0]).to_degrees(),
            pitch: (gyro[1] - self.gyro_bias[1]).to_degrees(),
            yaw: (gyro[2] - self.gyro_bias[2]).to_degrees(),
        };

        if fused {
            let angles = self.quaternion.to_euler_degrees();
            self.state.angles = RotationVector3D {
                roll: self
                    .roll_filter
                    .apply_filter_update(rates.roll, angles.roll, dt_s),
                pitch: self
                    .pitch_filter
                    .apply_filter_update(rates.pitch, angles.pitch, dt_s),
                yaw: angles.yaw,
            };
        }
        self.state.rates = rates;
        self.state
    }

    fn state(&self) -> AttitudeState {
        self.state
    }
}
