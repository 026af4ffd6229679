use embedded_hal::delay::DelayNs;
use heapless::Deque;

use super::imu_sensor_traits::{ImuSample, MotionProcessor};
use super::{AttitudeEstimator, AttitudeState};
use crate::config::constants::DMP_MAX_RATE_WINDOW;
use crate::config::store::MotionProcessorConfig;
use crate::util::error::AppError;
use crate::util::math::vectors::{wrap_degrees, RotationVector3D};

/// Attitude taken straight from an on-chip fusion engine.
///
/// The device only reports angles, rates are a finite difference between
/// the oldest and newest entry of a short sliding window.
pub struct MotionProcessorEstimator {
    processor: Box<dyn MotionProcessor>,
    angle_offset: RotationVector3D,
    rate_window: usize,
    warmup_reads: u32,
    warmup_interval_ms: u32,
    history: Deque<(f64, RotationVector3D), DMP_MAX_RATE_WINDOW>,
    clock_s: f64,
    state: AttitudeState,
}

impl MotionProcessorEstimator {
    pub fn new(
        processor: Box<dyn MotionProcessor>,
        config: &MotionProcessorConfig,
    ) -> Result<Self, AppError> {
        if !(2..=DMP_MAX_RATE_WINDOW).contains(&config.rate_window) {
            return Err(AppError::config(format!(
                "rate window {} must be within 2..={}",
                config.rate_window, DMP_MAX_RATE_WINDOW
            )));
        }
        Ok(MotionProcessorEstimator {
            processor,
            angle_offset: config.angle_offset,
            rate_window: config.rate_window,
            warmup_reads: config.warmup_reads,
            warmup_interval_ms: config.warmup_interval_ms,
            history: Deque::new(),
            clock_s: 0.0,
            state: AttitudeState::default(),
        })
    }

    /// Initializes the device and discards its first outputs while the
    /// on-chip filter settles.
    pub fn start<D: DelayNs + ?Sized>(&mut self, delay: &mut D) -> Result<(), AppError> {
        self.processor.initialize()?;
        let mut settled = 0_u32;
        for _ in 0..self.warmup_reads {
            delay.delay_ms(self.warmup_interval_ms);
            if self.processor.read_orientation().is_some() {
                settled += 1;
            }
        }
        log::info!(
            "Motion processor ready, {} of {} warm-up reads returned data",
            settled,
            self.warmup_reads
        );
        Ok(())
    }

    fn push(&mut self, angles: RotationVector3D) {
        if self.history.len() >= self.rate_window {
            self.history.pop_front();
        }
        // Length is bounded by rate_window above.
        let _ = self.history.push_back((self.clock_s, angles));

        if let (Some((oldest_s, oldest)), Some((newest_s, newest))) =
            (self.history.front(), self.history.back())
        {
            let elapsed_s = (newest_s - oldest_s) as f32;
            if elapsed_s > 0.0 {
                self.state.rates = RotationVector3D {
                    roll: wrap_degrees(newest.roll - oldest.roll) / elapsed_s,
                    pitch: wrap_degrees(newest.pitch - oldest.pitch) / elapsed_s,
                    yaw: wrap_degrees(newest.yaw - oldest.yaw) / elapsed_s,
                };
            }
        }
        self.state.angles = angles;
    }
}

impl AttitudeEstimator for MotionProcessorEstimator {
    /// Raw samples are ignored, the device has already fused them.
    fn update(&mut self, _sample: Option<&ImuSample>, dt_s: f32) -> AttitudeState {
        if dt_s > 0.0 {
            self.clock_s += f64::from(dt_s);
        }
        if let Some(raw) = self.processor.read_orientation() {
            self.push(raw + self.angle_offset);
        }
        self.state
    }

    fn state(&self) -> AttitudeState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::test_utils::*;
    use crate::util::error::ErrorKind;

    struct ScriptedProcessor {
        packets: VecDeque<Option<RotationVector3D>>,
        fail_init: bool,
    }

    impl ScriptedProcessor {
        fn boxed(packets: &[Option<(f32, f32, f32)>]) -> Box<Self> {
            Box::new(ScriptedProcessor {
                packets: packets
                    .iter()
                    .map(|packet| {
                        packet.map(|(roll, pitch, yaw)| RotationVector3D { roll, pitch, yaw })
                    })
                    .collect(),
                fail_init: false,
            })
        }
    }

    impl MotionProcessor for ScriptedProcessor {
        fn initialize(&mut self) -> Result<(), AppError> {
            if self.fail_init {
                Err(AppError::sensor("firmware upload failed"))
            } else {
                Ok(())
            }
        }

        fn read_orientation(&mut self) -> Option<RotationVector3D> {
            self.packets.pop_front().flatten()
        }
    }

    struct CountingDelay(u32);

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, _ns: u32) {
            self.0 += 1;
        }
    }

    fn config(window: usize) -> MotionProcessorConfig {
        MotionProcessorConfig {
            rate_window: window,
            angle_offset: RotationVector3D::default(),
            warmup_reads: 4,
            warmup_interval_ms: 4,
        }
    }

    #[test]
    fn rate_spans_oldest_to_newest_sample() {
        let processor = ScriptedProcessor::boxed(&[
            Some((0.0, 0.0, 0.0)),
            Some((1.0, 0.0, 0.0)),
            Some((3.0, -1.0, 0.0)),
            Some((6.0, -2.0, 0.0)),
        ]);
        let mut estimator = MotionProcessorEstimator::new(processor, &config(3)).unwrap();
        let mut state = AttitudeState::default();
        for _ in 0..4 {
            state = estimator.update(None, 0.01);
        }
        // Window holds 1.0, 3.0 and 6.0 over 20ms.
        assert!(value_near(250.0, state.rates.roll, 1e-2));
        assert!(value_near(-100.0, state.rates.pitch, 1e-2));
        assert!(value_close(6.0, state.angles.roll));
    }

    #[test]
    fn yaw_rate_unwraps_across_half_turn() {
        let processor =
            ScriptedProcessor::boxed(&[Some((0.0, 0.0, 170.0)), Some((0.0, 0.0, -170.0))]);
        let mut estimator = MotionProcessorEstimator::new(processor, &config(2)).unwrap();
        estimator.update(None, 0.01);
        let state = estimator.update(None, 0.01);
        assert!(value_near(2_000.0, state.rates.yaw, 1e-1));
    }

    #[test]
    fn missing_packet_holds_state() {
        let processor = ScriptedProcessor::boxed(&[
            Some((0.0, 0.0, 0.0)),
            Some((2.0, 0.0, 0.0)),
            None,
            None,
        ]);
        let mut estimator = MotionProcessorEstimator::new(processor, &config(2)).unwrap();
        estimator.update(None, 0.01);
        let with_packet = estimator.update(None, 0.01);
        assert_eq!(estimator.update(None, 0.01), with_packet);
        assert_eq!(estimator.update(None, 0.01), with_packet);
    }

    #[test]
    fn mounting_offset_is_added() {
        let processor = ScriptedProcessor::boxed(&[Some((1.0, 1.0, 1.0))]);
        let mut settings = config(2);
        settings.angle_offset = RotationVector3D {
            roll: 8.0,
            pitch: 1.1,
            yaw: 0.0,
        };
        let mut estimator = MotionProcessorEstimator::new(processor, &settings).unwrap();
        let state = estimator.update(None, 0.01);
        assert!(vector_close(
            (9.0, 2.1, 1.0),
            (state.angles.roll, state.angles.pitch, state.angles.yaw)
        ));
    }

    #[test]
    fn window_must_hold_two_samples() {
        let error = MotionProcessorEstimator::new(ScriptedProcessor::boxed(&[]), &config(1))
            .err()
            .unwrap();
        assert_eq!(error.kind, ErrorKind::Config);
        assert!(
            MotionProcessorEstimator::new(ScriptedProcessor::boxed(&[]), &config(51)).is_err()
        );
    }

    #[test]
    fn start_runs_warm_up_reads() {
        let processor = ScriptedProcessor::boxed(&[Some((0.0, 0.0, 0.0)), None]);
        let mut estimator = MotionProcessorEstimator::new(processor, &config(2)).unwrap();
        let mut delay = CountingDelay(0);
        estimator.start(&mut delay).unwrap();
        assert!(delay.0 >= 4);
    }

    #[test]
    fn start_propagates_init_failure() {
        let mut processor = ScriptedProcessor::boxed(&[]);
        processor.fail_init = true;
        let mut estimator = MotionProcessorEstimator::new(processor, &config(2)).unwrap();
        let error = estimator.start(&mut CountingDelay(0)).unwrap_err();
        assert_eq!(error.kind, ErrorKind::Sensor);
    }
}
