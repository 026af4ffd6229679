pub struct Integrator {
    current_value: f32,
}

impl Integrator {
    pub fn new() -> Self {
        Integrator {
            current_value: 0.0_f32,
        }
    }

    pub fn add_new_value(&mut self, value: f32, interval_seconds: f32) -> f32 {
        self.current_value += value * interval_seconds;
        self.current_value
    }

    pub fn get_current_value(&self) -> f32 {
        self.current_value
    }

    pub fn reset(&mut self) {
        self.current_value = 0.0_f32;
    }
}

impl Default for Integrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn accumulates_value_times_interval() {
        let mut integrator = Integrator::new();
        integrator.add_new_value(2.0, 0.5);
        let total = integrator.add_new_value(-1.0, 0.25);
        assert!(value_close(0.75, total));

        integrator.reset();
        assert_eq!(integrator.get_current_value(), 0.0);
    }
}
