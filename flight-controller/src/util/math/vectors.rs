use std::ops::{Add, AddAssign, Div, Mul, Sub};

use libm::{asinf, atan2f, atanf, cosf, sinf, sqrtf};

/// Acceleration in units of g, sensor frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AccelerationVector3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AccelerationVector3D {
    pub fn norm(&self) -> f32 {
        sqrtf(self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Unit vector, or `None` for a zero-length reading.
    pub fn normalized(&self) -> Option<AccelerationVector3D> {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        Some(*self / norm)
    }

    /// Roll and pitch in degrees implied by gravity alone.
    pub fn calculate_orientation_angles(&self) -> RotationVector2D {
        let roll = atan2f(self.y, self.z);
        let pitch = atanf(-self.x / sqrtf(self.y * self.y + self.z * self.z));

        RotationVector2D {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
        }
    }
}

impl Sub<AccelerationVector3D> for AccelerationVector3D {
    type Output = AccelerationVector3D;

    fn sub(self, rhs: AccelerationVector3D) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl AddAssign<AccelerationVector3D> for AccelerationVector3D {
    fn add_assign(&mut self, rhs: AccelerationVector3D) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Div<f32> for AccelerationVector3D {
    type Output = AccelerationVector3D;

    fn div(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RotationVector3D {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl From<RotationVector2D> for RotationVector3D {
    fn from(vector_2d: RotationVector2D) -> Self {
        RotationVector3D {
            roll: vector_2d.roll,
            pitch: vector_2d.pitch,
            yaw: 0.0_f32,
        }
    }
}

impl RotationVector3D {
    pub fn to_radians(self) -> Self {
        Self {
            roll: self.roll.to_radians(),
            pitch: self.pitch.to_radians(),
            yaw: self.yaw.to_radians(),
        }
    }
}

impl Add<RotationVector3D> for RotationVector3D {
    type Output = RotationVector3D;

    fn add(self, rhs: RotationVector3D) -> Self::Output {
        Self {
            roll: self.roll + rhs.roll,
            pitch: self.pitch + rhs.pitch,
            yaw: self.yaw + rhs.yaw,
        }
    }
}

impl Sub<RotationVector3D> for RotationVector3D {
    type Output = RotationVector3D;

    fn sub(self, rhs: RotationVector3D) -> Self::Output {
        Self {
            roll: self.roll - rhs.roll,
            pitch: self.pitch - rhs.pitch,
            yaw: self.yaw - rhs.yaw,
        }
    }
}

impl AddAssign<RotationVector3D> for RotationVector3D {
    fn add_assign(&mut self, rhs: RotationVector3D) {
        self.roll += rhs.roll;
        self.pitch += rhs.pitch;
        self.yaw += rhs.yaw;
    }
}

impl Mul<f32> for RotationVector3D {
    type Output = RotationVector3D;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            roll: self.roll * rhs,
            pitch: self.pitch * rhs,
            yaw: self.yaw * rhs,
        }
    }
}

impl Div<f32> for RotationVector3D {
    type Output = RotationVector3D;

    fn div(self, rhs: f32) -> Self::Output {
        Self {
            roll: self.roll / rhs,
            pitch: self.pitch / rhs,
            yaw: self.yaw / rhs,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RotationVector2D {
    pub roll: f32,
    pub pitch: f32,
}

/// Orientation quaternion, scalar first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Builds a unit quaternion from Z-Y-X Euler angles in degrees.
    pub fn from_euler_degrees(angles: RotationVector3D) -> Self {
        let half = angles.to_radians() * 0.5;
        let (sr, cr) = (sinf(half.roll), cosf(half.roll));
        let (sp, cp) = (sinf(half.pitch), cosf(half.pitch));
        let (sy, cy) = (sinf(half.yaw), cosf(half.yaw));

        Quaternion {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
        .normalized()
    }

    pub fn norm(&self) -> f32 {
        sqrtf(self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z)
    }

    /// Unit-length copy. A degenerate quaternion falls back to identity.
    pub fn normalized(&self) -> Self {
        let norm = self.norm();
        if norm == 0.0 || !norm.is_finite() {
            return Self::IDENTITY;
        }
        Quaternion {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// Z-Y-X Euler angles in degrees.
    pub fn to_euler_degrees(&self) -> RotationVector3D {
        let Quaternion { w, x, y, z } = *self;
        let roll = atan2f(2.0 * (w * x + y * z), w * w - x * x - y * y + z * z);
        let pitch = asinf((2.0 * (w * y - x * z)).clamp(-1.0, 1.0));
        let yaw = atan2f(2.0 * (w * z + x * y), w * w + x * x - y * y - z * z);

        RotationVector3D {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
        }
    }
}

/// Maps an angle difference in degrees into (-180, 180].
pub fn wrap_degrees(angle: f32) -> f32 {
    let mut wrapped = angle % 360.0;
    if wrapped > 180.0 {
        wrapped -= 360.0;
    } else if wrapped <= -180.0 {
        wrapped += 360.0;
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn level_gravity_gives_zero_angles() {
        let gravity = AccelerationVector3D {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        };
        let angles = gravity.calculate_orientation_angles();
        assert!(value_close(0.0, angles.roll));
        assert!(value_close(0.0, angles.pitch));
    }

    #[test]
    fn tilted_gravity_gives_roll_and_pitch() {
        let rolled = AccelerationVector3D {
            x: 0.0,
            y: 0.5,
            z: sqrtf(3.0) / 2.0,
        };
        assert!(value_near(30.0, rolled.calculate_orientation_angles().roll, 1e-3));

        let pitched = AccelerationVector3D {
            x: -0.5,
            y: 0.0,
            z: sqrtf(3.0) / 2.0,
        };
        assert!(value_near(30.0, pitched.calculate_orientation_angles().pitch, 1e-3));
    }

    #[test]
    fn zero_acceleration_cannot_be_normalized() {
        assert_eq!(AccelerationVector3D::default().normalized(), None);
    }

    #[test]
    fn euler_conversion_round_trips() {
        let angles = RotationVector3D {
            roll: 20.0,
            pitch: -35.0,
            yaw: 120.0,
        };
        let quaternion = Quaternion::from_euler_degrees(angles);
        assert!(value_close(1.0, quaternion.norm()));

        let back = quaternion.to_euler_degrees();
        assert!(vector_near(
            (20.0, -35.0, 120.0),
            (back.roll, back.pitch, back.yaw),
            1e-3
        ));
    }

    #[test]
    fn wraps_angle_differences() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), 180.0);
        assert_eq!(wrap_degrees(45.0), 45.0);
    }
}
