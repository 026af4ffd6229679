use super::mixer::{AxisRoute, MotorIndices};

/// Output slots of an X quadcopter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadMotor {
    FrontRight = 0, //CCW
    FrontLeft = 1,  //CW
    RearRight = 2,  //CW
    RearLeft = 3,   //CCW
}

pub const QUAD_MOTOR_COUNT: usize = 4;

fn indices(motors: &[QuadMotor]) -> MotorIndices {
    motors.iter().map(|motor| *motor as usize).collect()
}

fn route(positive: &[QuadMotor], negative: &[QuadMotor]) -> AxisRoute {
    AxisRoute {
        positive: indices(positive),
        negative: indices(negative),
    }
}

/// Mixer routes for roll, pitch and yaw, in that order.
///
/// Positive roll raises the left side, positive pitch the front, positive yaw
/// speeds up the clockwise pair.
pub fn quad_x_routes() -> [AxisRoute; 3] {
    use QuadMotor::*;
    [
        route(&[FrontLeft, RearLeft], &[FrontRight, RearRight]),
        route(&[FrontLeft, FrontRight], &[RearLeft, RearRight]),
        route(&[FrontLeft, RearRight], &[FrontRight, RearLeft]),
    ]
}
