/// One dimensional Kalman filter that predicts with a known rate and
/// corrects with a noisy absolute measurement.
pub struct KalmanFilter {
    state_prediction: f32,
    prediction_uncertainty: f32,
    input_variance: f32,
    measurement_uncertainty: f32,
}

impl KalmanFilter {
    pub fn new(input_variance: f32, measurement_uncertainty: f32) -> Self {
        KalmanFilter {
            input_variance,
            measurement_uncertainty,
            state_prediction: 0.0_f32,
            prediction_uncertainty: 0.0_f32,
        }
    }

    /// Restarts the filter at a known value with measurement-level confidence.
    pub fn seed(&mut self, value: f32) {
        self.state_prediction = value;
        self.prediction_uncertainty = self.measurement_uncertainty * self.measurement_uncertainty;
    }

    pub fn apply_filter_update(
        &mut self,
        current_rate: f32,
        measured_value: f32,
        t_interval_seconds: f32,
    ) -> f32 {
        let state_prediction = self.state_prediction + t_interval_seconds * current_rate;

        let prediction_uncertainty = self.prediction_uncertainty
            + t_interval_seconds * t_interval_seconds * self.input_variance * self.input_variance;

        let kalman_gain = prediction_uncertainty
            / (prediction_uncertainty + self.measurement_uncertainty * self.measurement_uncertainty);

        self.state_prediction =
            state_prediction + kalman_gain * (measured_value - state_prediction);
        self.prediction_uncertainty = (1.0_f32 - kalman_gain) * prediction_uncertainty;

        self.state_prediction
    }
}
