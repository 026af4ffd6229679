//! Float comparison helpers shared by the unit tests.

/// Tolerance within which floating-point values are considered equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

pub fn value_close(target: f32, value: f32) -> bool {
    value_near(target, value, TEST_TOLERANCE)
}

/// Like [`value_close`] with an explicit tolerance, for results of
/// iterative filters.
pub fn value_near(target: f32, value: f32, tolerance: f32) -> bool {
    (target - value).abs() < tolerance
}

pub fn vector_close(target: (f32, f32, f32), value: (f32, f32, f32)) -> bool {
    vector_near(target, value, TEST_TOLERANCE)
}

pub fn vector_near(target: (f32, f32, f32), value: (f32, f32, f32), tolerance: f32) -> bool {
    value_near(target.0, value.0, tolerance)
        && value_near(target.1, value.1, tolerance)
        && value_near(target.2, value.2, tolerance)
}
